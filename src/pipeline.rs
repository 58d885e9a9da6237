//! One extraction invocation: OCR branch and table branch in parallel, then
//! reconciliation, status and notices.

use anyhow::{Context, Result};
use image::{DynamicImage, RgbaImage};
use serde::Serialize;
use std::thread;
use tracing::{info, info_span, warn};

use crate::capture::crop_all;
use crate::config::{AppConfig, Regions};
use crate::error::ErrorCode;
use crate::logging::new_trace_id;
use crate::ocr::{OcrResult, OcrService, ParsedData, TableAnalysisResult, TesseractEngine, ensure_tesseract};
use crate::reconcile::reconcile;
use crate::table;

/// Outcome of an invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    /// All three fields recovered
    Complete,
    /// Fields missing, but the result may still be used
    Incomplete,
    /// Fields missing and policy forbids using the result
    Blocked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A user-facing message tied to one invocation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PipelineNotice {
    pub level: NoticeLevel,
    pub message: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub trace_id: String,
    pub status: PipelineStatus,
    /// Final fields after reconciliation
    pub parsed: ParsedData,
    /// Parser errors followed by reconciliation advisories
    pub diagnostics: Vec<String>,
    pub table: TableAnalysisResult,
    /// Absent when the invocation stopped before recognition
    pub ocr: Option<OcrResult>,
    pub notices: Vec<PipelineNotice>,
}

/// Trims the position code and turns numeric fields into one-decimal strings.
///
/// `x`/`X`/`×` are stripped; integral values get `.0`; non-numeric text is
/// kept as is. Empty fields become absent.
pub fn normalize_snapshot(parsed: &ParsedData) -> ParsedData {
    ParsedData {
        tooth: parsed
            .tooth
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        diameter: parsed.diameter.as_deref().and_then(normalize_numeric),
        length: parsed.length.as_deref().and_then(normalize_numeric),
    }
}

fn normalize_numeric(value: &str) -> Option<String> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, 'x' | 'X' | '×'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() && !cleaned.contains('.') => Some(format!("{:.1}", n)),
        _ => Some(cleaned),
    }
}

/// The extraction core wired to an OCR service.
pub struct ExtractionPipeline {
    ocr: OcrService,
    force_save_on_parse_incomplete: bool,
}

impl ExtractionPipeline {
    pub fn new(ocr: OcrService, force_save_on_parse_incomplete: bool) -> Self {
        Self {
            ocr,
            force_save_on_parse_incomplete,
        }
    }

    /// Locates Tesseract and builds the pipeline from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let paths = ensure_tesseract(&config.ocr)?;
        let engine =
            TesseractEngine::new(paths, config.ocr.languages.clone()).with_timeout(config.ocr.timeout());
        let ocr = OcrService::from_config(engine, config)?;
        Ok(Self::new(ocr, config.force_save_on_parse_incomplete))
    }

    /// Runs on decoded crops.
    pub fn run(&self, tooth: &DynamicImage, extra: &DynamicImage, table: &DynamicImage) -> PipelineOutput {
        self.run_with(tooth, extra, || table::analyze(table))
    }

    /// Runs on encoded crops. Undecodable OCR crops are an error; an
    /// undecodable table crop only disables the table branch.
    pub fn run_bytes(&self, tooth: &[u8], extra: &[u8], table: &[u8]) -> Result<PipelineOutput> {
        let tooth = image::load_from_memory(tooth).context("Failed to decode position-code crop")?;
        let extra = image::load_from_memory(extra).context("Failed to decode data-block crop")?;
        Ok(self.run_with(&tooth, &extra, || table::analyze_bytes(table)))
    }

    /// Crops a full screenshot with `regions` and runs on the crops.
    ///
    /// A region outside the screenshot blocks the invocation.
    pub fn run_screenshot(&self, screenshot: &RgbaImage, regions: &Regions) -> PipelineOutput {
        match crop_all(screenshot, regions) {
            Ok(crops) => self.run(
                &DynamicImage::ImageRgba8(crops.ocr_tooth),
                &DynamicImage::ImageRgba8(crops.ocr_extra),
                &DynamicImage::ImageRgba8(crops.table),
            ),
            Err(e) => {
                let trace_id = new_trace_id();
                warn!(trace_id = %trace_id, "{}", e);
                PipelineOutput {
                    notices: vec![PipelineNotice {
                        level: NoticeLevel::Error,
                        message: e.to_string(),
                        trace_id: trace_id.clone(),
                        code: Some(e.code()),
                    }],
                    trace_id,
                    status: PipelineStatus::Blocked,
                    parsed: ParsedData::default(),
                    diagnostics: Vec::new(),
                    table: TableAnalysisResult::undetected("not run"),
                    ocr: None,
                }
            }
        }
    }

    fn run_with<F>(&self, tooth: &DynamicImage, extra: &DynamicImage, analyze_table: F) -> PipelineOutput
    where
        F: FnOnce() -> TableAnalysisResult + Send,
    {
        let trace_id = new_trace_id();
        let span = info_span!("pipeline", trace_id = %trace_id);
        let _enter = span.enter();

        let (ocr, table) = thread::scope(|s| {
            let table_job = s.spawn(analyze_table);
            let ocr = self.ocr.recognize(tooth, extra);
            let table = table_job
                .join()
                .unwrap_or_else(|_| TableAnalysisResult::undetected("table reader panicked"));
            (ocr, table)
        });

        info!(
            "OCR tooth={:?} diameter={:?} length={:?}; table detected={} Ø{:?} × {:?} ({:?})",
            ocr.parsed.tooth,
            ocr.parsed.diameter,
            ocr.parsed.length,
            table.detected,
            table.diameter,
            table.length,
            table.confidence
        );

        let merged = reconcile(&normalize_snapshot(&ocr.parsed), &table);
        let parsed = merged.parsed;

        let mut diagnostics = ocr.errors.clone();
        diagnostics.extend(merged.advisories.iter().cloned());

        let mut notices = Vec::new();
        let mut notice = |level, message: String, code| {
            notices.push(PipelineNotice {
                level,
                message,
                trace_id: trace_id.clone(),
                code,
            })
        };

        let ocr_failed = ocr.recognition_failed();
        if ocr_failed {
            notice(NoticeLevel::Warning, ErrorCode::OcrFailed.describe().to_string(), Some(ErrorCode::OcrFailed));
        }
        if !ocr.errors.is_empty() {
            notice(NoticeLevel::Warning, format!("OCR parse warnings: {}", ocr.errors.join("; ")), None);
        }
        for advisory in &merged.advisories {
            notice(NoticeLevel::Warning, advisory.clone(), None);
        }

        let status = if parsed.is_complete() {
            notice(
                NoticeLevel::Success,
                format!(
                    "tooth {} Ø{} × {}mm",
                    parsed.tooth.as_deref().unwrap_or_default(),
                    parsed.diameter.as_deref().unwrap_or_default(),
                    parsed.length.as_deref().unwrap_or_default()
                ),
                None,
            );
            PipelineStatus::Complete
        } else if ocr_failed {
            PipelineStatus::Incomplete
        } else if self.force_save_on_parse_incomplete {
            notice(
                NoticeLevel::Warning,
                format!("{} Continuing because force_save_on_parse_incomplete is on.", ErrorCode::ParseIncomplete.describe()),
                Some(ErrorCode::ParseIncomplete),
            );
            PipelineStatus::Incomplete
        } else {
            notice(
                NoticeLevel::Error,
                format!("{} Result blocked; set force_save_on_parse_incomplete to allow it.", ErrorCode::ParseIncomplete.describe()),
                Some(ErrorCode::ParseIncomplete),
            );
            PipelineStatus::Blocked
        };

        info!("Pipeline finished: {:?}", status);

        PipelineOutput {
            trace_id,
            status,
            parsed,
            diagnostics,
            table,
            ocr: Some(ocr),
            notices,
        }
    }
}

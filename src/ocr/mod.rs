pub mod engine;
pub mod parser;
pub mod preprocess;
pub mod setup;
pub mod types;
pub mod worker;

pub use engine::{OcrEngine, OcrLine, OcrWord, PageSegMode, TesseractEngine};
pub use parser::{PositionalOrder, TextParser};
pub use preprocess::preprocess;
pub use setup::{TesseractPaths, ensure_tesseract};
pub use types::{OcrResult, ParsedData, PreprocessOptions, RawOcrOutput, RawPair, TableAnalysisResult, TableConfidence};
pub use worker::OcrWorker;

use anyhow::Result;
use image::DynamicImage;
use std::thread;
use tracing::{debug, info};

use crate::config::AppConfig;

/// High-level OCR branch: two crops in, raw text plus parsed fields out.
///
/// Both crops are preprocessed with the same options and submitted to the
/// worker concurrently. Recognition failures never abort; they surface as
/// empty raw text and parser errors.
pub struct OcrService {
    worker: OcrWorker,
    parser: TextParser,
    options: PreprocessOptions,
    debug: bool,
}

impl OcrService {
    pub fn new(worker: OcrWorker, parser: TextParser, options: PreprocessOptions) -> Self {
        Self {
            worker,
            parser,
            options,
            debug: false,
        }
    }

    /// Logs raw recognized text at info level when on.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Builds the service around `engine` using the settings in `config`.
    pub fn from_config<E: OcrEngine + 'static>(engine: E, config: &AppConfig) -> Result<Self> {
        let worker = OcrWorker::spawn(engine, config.ocr.timeout());
        let parser = TextParser::new()?.with_order(config.positional_order);
        Ok(Self::new(worker, parser, config.preprocess).with_debug(config.debug))
    }

    /// Recognizes and parses both crops.
    pub fn recognize(&self, tooth: &DynamicImage, extra: &DynamicImage) -> OcrResult {
        let (tooth_raw, extra_raw) = thread::scope(|s| {
            let tooth_job = s.spawn(|| {
                let img = preprocess(tooth, &self.options);
                self.worker.recognize(img, PageSegMode::SingleLine, "tooth")
            });
            let img = preprocess(extra, &self.options);
            let extra_raw = self.worker.recognize(img, PageSegMode::SingleBlock, "extra");
            let tooth_raw = tooth_job.join().unwrap_or_else(|_| RawOcrOutput::failed());
            (tooth_raw, extra_raw)
        });

        if self.debug {
            info!(
                "OCR raw tooth={:?} ({:.1}) extra={:?} ({:.1})",
                tooth_raw.text, tooth_raw.confidence, extra_raw.text, extra_raw.confidence
            );
        } else {
            debug!("OCR raw tooth={:?} extra={:?}", tooth_raw.text, extra_raw.text);
        }

        let (parsed, errors) = self.parser.parse(&tooth_raw.text, &extra_raw.text);
        OcrResult {
            raw: RawPair {
                tooth: tooth_raw,
                extra: extra_raw,
            },
            parsed,
            errors,
        }
    }
}

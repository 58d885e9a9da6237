//! Offline grid search over preprocessing options.
//!
//! Each combination is scored against labeled screenshots using the same
//! preprocessor and parser as the extraction pipeline.

use anyhow::{Context, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::capture::{RegionRect, crop_region};
use crate::ocr::{OcrEngine, PageSegMode, ParsedData, PreprocessOptions, RawOcrOutput, TextParser, preprocess};

/// Points for each field that matches the label exactly.
pub const POINTS_PER_FIELD: u32 = 2;
/// Best possible score for one sample.
pub const MAX_SAMPLE_SCORE: u32 = POINTS_PER_FIELD * 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningRegions {
    pub ocr_tooth: RegionRect,
    pub ocr_extra: RegionRect,
}

/// A labeled screenshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Path relative to the manifest
    pub file: String,
    pub tooth: String,
    pub length: String,
    pub diameter: String,
}

/// The labeled sample set and the crop regions that apply to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningManifest {
    pub regions: TuningRegions,
    pub samples: Vec<Sample>,
}

impl TuningManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse manifest {}", path.display()))
    }
}

/// The two OCR crops of one sample, cut once up front.
pub struct SampleCrops {
    pub sample: Sample,
    pub tooth: DynamicImage,
    pub extra: DynamicImage,
}

/// Loads every sample image under `base_dir` and crops it.
pub fn load_crops(manifest: &TuningManifest, base_dir: &Path) -> Result<Vec<SampleCrops>> {
    manifest
        .samples
        .iter()
        .map(|sample| -> Result<SampleCrops> {
            let path = base_dir.join(&sample.file);
            let img = image::open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?
                .to_rgba8();
            let tooth = crop_region(&img, &manifest.regions.ocr_tooth, "ocr_tooth")?;
            let extra = crop_region(&img, &manifest.regions.ocr_extra, "ocr_extra")?;
            Ok(SampleCrops {
                sample: sample.clone(),
                tooth: DynamicImage::ImageRgba8(tooth),
                extra: DynamicImage::ImageRgba8(extra),
            })
        })
        .collect()
}

/// Values swept for each option. Grayscale is always on.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamGrid {
    pub contrast: Vec<f32>,
    pub scale: Vec<f32>,
    pub threshold: Vec<u8>,
    pub sharpen: Vec<bool>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            contrast: vec![1.0, 1.5, 2.0, 2.5, 3.0],
            scale: vec![2.0, 3.0, 4.0],
            threshold: vec![0, 80, 100, 128, 150],
            sharpen: vec![true, false],
        }
    }
}

impl ParamGrid {
    pub fn combinations(&self) -> Vec<PreprocessOptions> {
        let mut out = Vec::new();
        for &contrast in &self.contrast {
            for &scale in &self.scale {
                for &threshold in &self.threshold {
                    for &sharpen in &self.sharpen {
                        out.push(PreprocessOptions {
                            grayscale: true,
                            contrast,
                            scale,
                            threshold,
                            sharpen,
                        });
                    }
                }
            }
        }
        out
    }
}

pub fn score_one(parsed: &ParsedData, sample: &Sample) -> u32 {
    let hit = |field: &Option<String>, expected: &str| {
        if field.as_deref() == Some(expected) { POINTS_PER_FIELD } else { 0 }
    };
    hit(&parsed.tooth, &sample.tooth) + hit(&parsed.length, &sample.length) + hit(&parsed.diameter, &sample.diameter)
}

#[derive(Clone, Debug)]
pub struct SampleDetail {
    pub file: String,
    pub parsed: ParsedData,
    pub score: u32,
    pub tooth: RawOcrOutput,
    pub extra: RawOcrOutput,
}

/// Score of one option set over the whole sample set.
#[derive(Clone, Debug)]
pub struct ComboResult {
    pub options: PreprocessOptions,
    pub score: u32,
    pub details: Vec<SampleDetail>,
}

impl ComboResult {
    /// Mean engine confidence over both crops of every sample.
    pub fn mean_confidence(&self) -> f32 {
        if self.details.is_empty() {
            return 0.0;
        }
        let total: f32 = self.details.iter().map(|d| d.tooth.confidence + d.extra.confidence).sum();
        total / (self.details.len() * 2) as f32
    }
}

fn recognize(engine: &mut dyn OcrEngine, img: &DynamicImage, mode: PageSegMode) -> RawOcrOutput {
    engine.recognize(img, mode).unwrap_or_else(|e| {
        warn!("OCR failed during tuning: {:#}", e);
        RawOcrOutput::failed()
    })
}

/// Runs every sample through preprocess, OCR and parse with `options`.
pub fn evaluate(
    engine: &mut dyn OcrEngine,
    parser: &TextParser,
    crops: &[SampleCrops],
    options: &PreprocessOptions,
) -> ComboResult {
    let details: Vec<SampleDetail> = crops
        .iter()
        .map(|c| {
            let tooth = recognize(engine, &preprocess(&c.tooth, options), PageSegMode::SingleLine);
            let extra = recognize(engine, &preprocess(&c.extra, options), PageSegMode::SingleBlock);
            let (parsed, _) = parser.parse(&tooth.text, &extra.text);
            SampleDetail {
                file: c.sample.file.clone(),
                score: score_one(&parsed, &c.sample),
                parsed,
                tooth,
                extra,
            }
        })
        .collect();

    ComboResult {
        options: *options,
        score: details.iter().map(|d| d.score).sum(),
        details,
    }
}

/// Best first: higher score, then higher mean confidence.
pub fn rank(results: &mut [ComboResult]) {
    results.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.mean_confidence().total_cmp(&a.mean_confidence()))
    });
}

/// Evaluates every grid point and returns them ranked.
pub fn run_grid(
    engine: &mut dyn OcrEngine,
    parser: &TextParser,
    crops: &[SampleCrops],
    grid: &ParamGrid,
) -> Vec<ComboResult> {
    let combos = grid.combinations();
    let max = crops.len() as u32 * MAX_SAMPLE_SCORE;
    info!("Sweeping {} combinations over {} samples (max score {})", combos.len(), crops.len(), max);

    let mut results = Vec::with_capacity(combos.len());
    let mut best = 0;
    for (i, options) in combos.iter().enumerate() {
        let result = evaluate(engine, parser, crops, options);
        best = best.max(result.score);
        info!("[{:>3}/{}] score {}/{} best {}/{}", i + 1, combos.len(), result.score, max, best, max);
        results.push(result);
    }

    rank(&mut results);
    results
}

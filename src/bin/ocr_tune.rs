//! Preprocessing parameter sweep.
//!
//! Crops the OCR regions from every labeled screenshot in the manifest, tries
//! each grid point, scores against the labels and prints the best options.
//!
//! ```bash
//! ocr-tune --manifest resources/tuning/samples.json --top 10
//! ```

use anyhow::{Context, Result, bail};
use clap::Parser;
use implant_snap::config::load_config;
use implant_snap::logging::init_tracing;
use implant_snap::ocr::{PreprocessOptions, TesseractEngine, TextParser, ensure_tesseract};
use implant_snap::paths;
use implant_snap::tune::{
    ComboResult, MAX_SAMPLE_SCORE, ParamGrid, SampleCrops, TuningManifest, evaluate, load_crops, run_grid,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "ocr-tune")]
#[command(about = "Grid search over OCR preprocessing options against labeled screenshots")]
struct Args {
    /// Sample manifest; defaults to resources/tuning/samples.json next to the executable
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// Config file for OCR engine settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ranked results to print
    #[arg(long, default_value_t = 10)]
    top: usize,
}

fn print_detail(result: &ComboResult) {
    for d in &result.details {
        println!("[{}] score={}/{}", d.file, d.score, MAX_SAMPLE_SCORE);
        println!(
            "  tooth={:?} length={:?} diameter={:?}",
            d.parsed.tooth, d.parsed.length, d.parsed.diameter
        );
        println!("  tooth OCR ({:.0}%): {:?}", d.tooth.confidence, d.tooth.text);
        println!("  extra OCR ({:.0}%): {:?}", d.extra.confidence, d.extra.text.replace('\n', " | "));
    }
}

fn summary(options: &PreprocessOptions) -> String {
    format!(
        "contrast={} scale={} threshold={:>3} sharpen={}",
        options.contrast, options.scale, options.threshold, options.sharpen
    )
}

fn main() -> Result<()> {
    let _ = paths::ensure_directories();
    init_tracing();
    let args = Args::parse();

    let config = load_config(&args.config.unwrap_or_else(paths::get_config_path));
    let manifest_path = args
        .manifest
        .unwrap_or_else(|| paths::get_tuning_dir().join("samples.json"));
    let manifest = TuningManifest::load(&manifest_path)?;
    let base_dir = manifest_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();

    let crops: Vec<SampleCrops> = load_crops(&manifest, &base_dir)?;
    if crops.is_empty() {
        bail!("{} lists no samples", manifest_path.display());
    }
    info!("Loaded {} samples from {}", crops.len(), manifest_path.display());

    let mut engine = TesseractEngine::new(ensure_tesseract(&config.ocr)?, config.ocr.languages.clone())
        .with_timeout(config.ocr.timeout());
    let parser = TextParser::new()?.with_order(config.positional_order);
    let max = crops.len() as u32 * MAX_SAMPLE_SCORE;

    let baseline = evaluate(&mut engine, &parser, &crops, &config.preprocess);
    println!("Baseline ({}): {}/{}", summary(&config.preprocess), baseline.score, max);
    print_detail(&baseline);

    let results = run_grid(&mut engine, &parser, &crops, &ParamGrid::default());
    let best = results.first().context("grid produced no results")?;

    println!("\nTop {} results:", args.top.min(results.len()));
    for r in results.iter().take(args.top) {
        let bar = "█".repeat((r.score * 20 / max.max(1)) as usize);
        println!(
            "[{:<20}] {:>2}/{}  conf={:>5.1}  {}",
            bar,
            r.score,
            max,
            r.mean_confidence(),
            summary(&r.options)
        );
    }

    println!("\nBest options:");
    println!("{}", serde_json::to_string_pretty(&best.options)?);
    println!("\nDetail for best options:");
    print_detail(best);

    Ok(())
}

//! implant-snap command line.
//!
//! Runs the extraction pipeline on a full screenshot or on three prepared
//! crops and prints the result as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use implant_snap::ExtractionPipeline;
use implant_snap::config::{get_config, init_config};
use implant_snap::logging::{init_tracing, install_panic_hook};
use implant_snap::paths;
use implant_snap::table::analyze_bytes;

#[derive(Parser)]
#[command(name = "implant-snap")]
#[command(about = "Extract implant position, diameter and length from planning screenshots")]
struct Cli {
    /// Config file; defaults to config.json next to the executable
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crop a full screenshot with the configured regions and extract
    Extract {
        screenshot: PathBuf,
    },
    /// Extract from three prepared crops
    Crops {
        tooth: PathBuf,
        extra: PathBuf,
        table: PathBuf,
    },
    /// Read only the reference table crop
    Table {
        image: PathBuf,
    },
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    init_config(cli.config.as_deref());
    let config = get_config();

    match cli.command {
        Command::Extract { screenshot } => {
            let img = image::open(&screenshot)
                .with_context(|| format!("Failed to open {}", screenshot.display()))?
                .to_rgba8();
            if img.dimensions() != (config.screen_width, config.screen_height) {
                info!(
                    "Screenshot is {}x{}, regions assume {}x{}",
                    img.width(),
                    img.height(),
                    config.screen_width,
                    config.screen_height
                );
            }
            let pipeline = ExtractionPipeline::from_config(config)?;
            print_json(&pipeline.run_screenshot(&img, &config.regions))?;
        }
        Command::Crops { tooth, extra, table } => {
            let pipeline = ExtractionPipeline::from_config(config)?;
            let output = pipeline.run_bytes(&read(&tooth)?, &read(&extra)?, &read(&table)?)?;
            // Print while the pipeline is still alive; dropping it may wait on the OCR thread
            print_json(&output)?;
        }
        Command::Table { image } => print_json(&analyze_bytes(&read(&image)?))?,
    }
    Ok(())
}

fn main() -> Result<()> {
    install_panic_hook();
    let _ = paths::ensure_directories();
    init_tracing();

    let cli = Cli::parse();
    run(cli).inspect_err(|e| error!("{:#}", e))
}

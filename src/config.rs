//! Configuration types.
//!
//! Loads settings from config.json at startup. Provides crop regions,
//! preprocessing parameters, and OCR engine settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

use crate::capture::RegionRect;
use crate::ocr::parser::PositionalOrder;
use crate::ocr::PreprocessOptions;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Default wait ceiling for a single recognition call.
pub const DEFAULT_OCR_TIMEOUT_MS: u64 = 15_000;

/// The three extraction regions in full-screen coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Regions {
    /// Position-code label
    pub ocr_tooth: RegionRect,
    /// Free-text data block with length and diameter
    pub ocr_extra: RegionRect,
    /// Color-coded reference table
    pub table: RegionRect,
}

impl Default for Regions {
    fn default() -> Self {
        Self {
            ocr_tooth: RegionRect::new(85, 261, 72, 62),
            ocr_extra: RegionRect::new(332, 551, 229, 300),
            table: RegionRect::new(795, 571, 440, 345),
        }
    }
}

/// OCR engine settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Tesseract language list, e.g. "chi_sim+eng"
    pub languages: String,
    /// Maximum wait per recognition call (milliseconds)
    pub timeout_ms: u64,
    /// Explicit tesseract executable; searched on PATH when absent
    pub tesseract_path: Option<PathBuf>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            languages: "chi_sim+eng".to_string(),
            timeout_ms: DEFAULT_OCR_TIMEOUT_MS,
            tesseract_path: None,
        }
    }
}

impl OcrSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    pub regions: Regions,
    pub preprocess: PreprocessOptions,
    pub ocr: OcrSettings,
    /// Order of bare "= N mm" values in the data block
    pub positional_order: PositionalOrder,
    /// Report incomplete results as `incomplete` instead of `blocked`
    pub force_save_on_parse_incomplete: bool,
    /// Log raw OCR text at info level
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            screen_width: 1920,
            screen_height: 1080,
            regions: Regions::default(),
            preprocess: PreprocessOptions::default(),
            ocr: OcrSettings::default(),
            positional_order: PositionalOrder::default(),
            force_save_on_parse_incomplete: false,
            debug: false,
        }
    }
}

impl AppConfig {
    /// Reads and parses a config file, failing on any error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Writes the config as pretty JSON.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("Failed to write config {}", path.display()))
    }
}

/// Loads configuration from `path`, or returns defaults if it is missing or broken.
pub fn load_config(path: &Path) -> AppConfig {
    info!("Looking for config at: {}", path.display());

    if !path.exists() {
        info!("{} not found. Using default config.", path.display());
        return AppConfig::default();
    }

    match AppConfig::load_from(path) {
        Ok(config) => {
            info!("Config loaded from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{:#}. Using defaults.", e);
            AppConfig::default()
        }
    }
}

/// Initializes the global configuration. Call once at startup.
///
/// Without an explicit path, config.json next to the executable is used.
pub fn init_config(path: Option<&Path>) {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(crate::paths::get_config_path);
    let _ = CONFIG.set(load_config(&path));
}

/// Returns the global configuration, loading the default file on first use.
pub fn get_config() -> &'static AppConfig {
    CONFIG.get_or_init(|| load_config(&crate::paths::get_config_path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("config.json"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_broken_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(load_config(&path), AppConfig::default());
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "preprocess": { "contrast": 2.0 },
                "ocr": { "timeout_ms": 500 },
                "positional_order": "diameter_first"
            }"#,
        )
        .unwrap();

        let config = load_config(&path);
        assert_eq!(config.preprocess.contrast, 2.0);
        assert_eq!(config.preprocess.scale, 3.0);
        assert_eq!(config.ocr.timeout_ms, 500);
        assert_eq!(config.ocr.timeout(), Duration::from_millis(500));
        assert_eq!(config.ocr.languages, "chi_sim+eng");
        assert_eq!(config.positional_order, PositionalOrder::DiameterFirst);
        assert_eq!(config.regions, Regions::default());
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let shipped: AppConfig = serde_json::from_str(include_str!("../config.json")).unwrap();
        assert_eq!(shipped, AppConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.debug = true;
        config.regions.table = RegionRect::new(1, 2, 3, 4);
        config.save_to(&path).unwrap();

        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }
}

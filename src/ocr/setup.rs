use anyhow::{Context, Result, anyhow};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::OcrSettings;
use crate::paths::get_tesseract_dir;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Where the engine binary and its language data live.
///
/// `tessdata` is `None` when Tesseract's built-in search path should be used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: Option<PathBuf>,
}

/// Locates Tesseract and makes sure every configured language is available.
///
/// Missing `.traineddata` files are copied from a system tessdata directory
/// or downloaded into the local data dir.
pub fn ensure_tesseract(settings: &OcrSettings) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(settings.tesseract_path.as_deref())?;
    let languages = split_languages(&settings.languages);

    if let Some(dir) = find_tessdata_dir(&languages) {
        info!("Using tessdata at {} for {}", dir.display(), settings.languages);
        return Ok(TesseractPaths {
            executable,
            tessdata: Some(dir),
        });
    }

    let local = get_tesseract_dir().join("tessdata");
    fs::create_dir_all(&local)
        .with_context(|| format!("Failed to create {}", local.display()))?;

    for lang in &languages {
        let target = local.join(traineddata_name(lang));
        if target.exists() {
            continue;
        }
        if let Some(source) = system_tessdata_dirs()
            .into_iter()
            .map(|d| d.join(traineddata_name(lang)))
            .find(|p| p.exists())
        {
            info!("Copying {} from {}", traineddata_name(lang), source.display());
            fs::copy(&source, &target)?;
        } else {
            download_traineddata(lang, &target)?;
        }
    }

    info!("Tesseract ready, tessdata at {}", local.display());
    Ok(TesseractPaths {
        executable,
        tessdata: Some(local),
    })
}

/// "chi_sim+eng" → ["chi_sim", "eng"]
pub fn split_languages(languages: &str) -> Vec<String> {
    languages
        .split('+')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn traineddata_name(lang: &str) -> String {
    format!("{}.traineddata", lang)
}

/// Finds the Tesseract executable: explicit path, then PATH, then common install dirs.
pub fn find_tesseract_executable(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        warn!("Configured tesseract_path {} does not exist", path.display());
    }

    // Check PATH
    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    let common_paths = [
        r"C:\Program Files\Tesseract-OCR\tesseract.exe",
        r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
        "/usr/bin/tesseract",
        "/usr/local/bin/tesseract",
        "/opt/homebrew/bin/tesseract",
    ];

    common_paths
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| {
            anyhow!(
                "Tesseract not found. Install Tesseract-OCR and add it to PATH, \
                 or set ocr.tesseract_path in config.json"
            )
        })
}

/// Returns the first tessdata directory holding all `languages`.
pub fn find_tessdata_dir(languages: &[String]) -> Option<PathBuf> {
    let mut candidates = vec![get_tesseract_dir().join("tessdata")];
    candidates.extend(system_tessdata_dirs());
    candidates
        .into_iter()
        .find(|dir| has_languages(dir, languages))
}

pub fn has_languages(dir: &Path, languages: &[String]) -> bool {
    !languages.is_empty()
        && languages
            .iter()
            .all(|lang| dir.join(traineddata_name(lang)).exists())
}

fn system_tessdata_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    // TESSDATA_PREFIX may point at tessdata itself or its parent
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        dirs.push(prefix.join("tessdata"));
        dirs.push(prefix);
    }

    dirs.extend(
        [
            r"C:\Program Files\Tesseract-OCR\tessdata",
            r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
            "/usr/share/tesseract-ocr/5/tessdata",
            "/usr/share/tesseract-ocr/4.00/tessdata",
            "/usr/share/tessdata",
            "/usr/local/share/tessdata",
            "/opt/homebrew/share/tessdata",
        ]
        .iter()
        .map(PathBuf::from),
    );
    dirs
}

/// Downloads one language model from the tessdata repository.
fn download_traineddata(lang: &str, target: &Path) -> Result<()> {
    let url = format!("{}/{}", TESSDATA_REPO, traineddata_name(lang));
    info!("Downloading {}...", url);

    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "implant-snap")
        .send()
        .with_context(|| format!("Failed to download {}", traineddata_name(lang)))?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            traineddata_name(lang),
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(target)?;
    file.write_all(&bytes)?;

    info!("Downloaded {} ({} bytes)", traineddata_name(lang), bytes.len());
    Ok(())
}

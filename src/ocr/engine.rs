use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

use super::setup::TesseractPaths;
use super::types::RawOcrOutput;

/// Ceiling for one Tesseract process unless overridden.
const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(15);
const PROCESS_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Tesseract page segmentation modes used by the extraction core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageSegMode {
    /// One line of text (position-code crop)
    SingleLine,
    /// One uniform block of text (data-block crop)
    SingleBlock,
}

impl PageSegMode {
    pub fn as_arg(self) -> &'static str {
        match self {
            PageSegMode::SingleLine => "7",
            PageSegMode::SingleBlock => "6",
        }
    }
}

/// A text recognizer. Implementations may hold a loaded model and need not be
/// reentrant; callers go through [`super::worker::OcrWorker`] to serialize use.
pub trait OcrEngine: Send {
    fn recognize(&mut self, image: &DynamicImage, mode: PageSegMode) -> Result<RawOcrOutput>;
}

/// Represents a line of OCR text
#[derive(Debug, Clone)]
pub struct OcrLine {
    pub text: String,
    pub words: Vec<OcrWord>,
}

/// Represents a single word from OCR with confidence score
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// Tesseract invoked as an external process with TSV output.
///
/// A process still running after `timeout` is killed.
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    languages: String,
    timeout: Duration,
}

impl TesseractEngine {
    pub fn new(paths: TesseractPaths, languages: impl Into<String>) -> Self {
        Self {
            executable: paths.executable,
            tessdata: paths.tessdata,
            languages: languages.into(),
            timeout: DEFAULT_PROCESS_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn run(&self, img: &DynamicImage, mode: PageSegMode) -> Result<Vec<OcrLine>> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write OCR input image")?;

        // Create temporary output file (Tesseract adds .tsv extension)
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut command = Command::new(&self.executable);
        command.arg(temp_input.path()).arg(&output_base);
        if let Some(tessdata) = &self.tessdata {
            command.arg("--tessdata-dir").arg(tessdata);
        }
        let mut child = command
            .arg("-l")
            .arg(&self.languages)
            .arg("--psm")
            .arg(mode.as_arg())
            .arg("tsv")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.executable.display()))?;

        let status = wait_with_deadline(&mut child, self.timeout)?;
        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            return Err(anyhow!("Tesseract failed ({}): {}", status, stderr.trim()));
        }

        // Read TSV output
        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;

        // Clean up output file
        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_output(&tsv_content))
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&mut self, image: &DynamicImage, mode: PageSegMode) -> Result<RawOcrOutput> {
        let lines = self.run(image, mode)?;
        Ok(summarize_lines(&lines))
    }
}

/// Waits for `child`, killing it once `timeout` has passed.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!(
                "Tesseract did not finish within {} ms, killed",
                timeout.as_millis()
            ));
        }
        thread::sleep(PROCESS_POLL_INTERVAL);
    }
}

/// Joins lines with newlines and averages word confidences.
pub fn summarize_lines(lines: &[OcrLine]) -> RawOcrOutput {
    let text = lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let confidences: Vec<f32> = lines
        .iter()
        .flat_map(|l| l.words.iter().map(|w| w.confidence))
        .collect();
    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };

    RawOcrOutput {
        text: text.trim().to_string(),
        confidence: confidence.clamp(0.0, 100.0),
    }
}

/// Parses Tesseract TSV output into structured OcrLine data.
///
/// Lines are keyed by (block, paragraph, line) so multi-block crops keep
/// their line breaks.
pub fn parse_tsv_output(tsv: &str) -> Vec<OcrLine> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_key: Option<(i32, i32, i32)> = None;
    let mut current_words: Vec<OcrWord> = Vec::new();

    // Skip header
    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let level: i32 = fields[0].parse().unwrap_or(-1);
        let key = (
            fields[2].parse().unwrap_or(-1),
            fields[3].parse().unwrap_or(-1),
            fields[4].parse().unwrap_or(-1),
        );
        let conf: f32 = fields[10].trim().parse().unwrap_or(-1.0);
        let text = fields[11].trim();

        // Level 5 = word
        if level != 5 || text.is_empty() {
            continue;
        }

        if current_key.is_some_and(|k| k != key) {
            flush_line(&mut lines, std::mem::take(&mut current_words));
        }
        current_key = Some(key);

        if conf >= 0.0 {
            current_words.push(OcrWord {
                text: text.to_string(),
                confidence: conf,
            });
        }
    }

    // Don't forget the last line
    flush_line(&mut lines, current_words);
    lines
}

fn flush_line(lines: &mut Vec<OcrLine>, words: Vec<OcrWord>) {
    if words.is_empty() {
        return;
    }
    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    lines.push(OcrLine { text, words });
}


#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn row(block: i32, line: i32, conf: f32, text: &str) -> String {
        format!("5\t1\t{}\t1\t{}\t1\t0\t0\t10\t10\t{}\t{}", block, line, conf, text)
    }

    #[test]
    fn test_parse_tsv_groups_lines() {
        let tsv = [
            HEADER.to_string(),
            "1\t1\t0\t0\t0\t0\t0\t0\t100\t100\t-1\t".to_string(),
            row(1, 1, 90.0, "长度"),
            row(1, 1, 80.0, "=13.0mm"),
            row(1, 2, 70.0, "直径"),
            row(1, 2, 60.0, "=4.0mm"),
        ]
        .join("\n");

        let lines = parse_tsv_output(&tsv);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "长度 =13.0mm");
        assert_eq!(lines[0].words.len(), 2);
        assert_eq!(lines[0].words[1].confidence, 80.0);
        assert_eq!(lines[1].text, "直径 =4.0mm");
    }

    #[test]
    fn test_parse_tsv_splits_blocks() {
        let tsv = [HEADER.to_string(), row(1, 1, 90.0, "a"), row(2, 1, 90.0, "b")].join("\n");
        let lines = parse_tsv_output(&tsv);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_parse_tsv_skips_short_and_empty_rows() {
        let tsv = [
            HEADER.to_string(),
            "garbage".to_string(),
            row(1, 1, 95.0, ""),
            row(1, 1, 95.0, "21"),
        ]
        .join("\n");
        let lines = parse_tsv_output(&tsv);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "21");
    }

    #[test]
    fn test_summarize_lines() {
        let tsv = [
            HEADER.to_string(),
            row(1, 1, 90.0, "Implant"),
            row(1, 1, 70.0, "21"),
            row(1, 2, 50.0, "Selected"),
        ]
        .join("\n");
        let raw = summarize_lines(&parse_tsv_output(&tsv));
        assert_eq!(raw.text, "Implant 21\nSelected");
        assert_eq!(raw.confidence, 70.0);
    }

    #[test]
    fn test_summarize_empty_is_failure_shape() {
        let raw = summarize_lines(&[]);
        assert_eq!(raw, RawOcrOutput::failed());
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_process_is_killed_at_deadline() {
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        let started = Instant::now();
        let err = wait_with_deadline(&mut child, Duration::from_millis(100)).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(err.to_string().contains("did not finish"));
        assert!(child.try_wait().unwrap().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_finished_process_returns_status() {
        let mut child = Command::new("true").spawn().unwrap();
        let status = wait_with_deadline(&mut child, Duration::from_secs(5)).unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_page_seg_mode_args() {
        assert_eq!(PageSegMode::SingleLine.as_arg(), "7");
        assert_eq!(PageSegMode::SingleBlock.as_arg(), "6");
    }
}

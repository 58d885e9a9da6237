//! Error taxonomy shared by the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse failure categories attached to pipeline notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    CaptureFailed,
    RegionOutOfBound,
    OcrFailed,
    ParseIncomplete,
    WriteFailed,
}

impl ErrorCode {
    /// User-facing explanation for the code.
    pub fn describe(self) -> &'static str {
        match self {
            ErrorCode::CaptureFailed => "Screenshot failed; check screen capture permissions.",
            ErrorCode::RegionOutOfBound => "A configured region lies outside the screen; redefine it.",
            ErrorCode::OcrFailed => "OCR could not recognize any text.",
            ErrorCode::ParseIncomplete => "Some fields could not be recognized.",
            ErrorCode::WriteFailed => "Writing the output failed; check directory permissions.",
        }
    }
}

/// Region validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    #[error("{name} is out of bounds: x or y is negative")]
    NegativeOrigin { name: String },

    #[error("{name} is out of bounds: width or height is less than 1")]
    Degenerate { name: String },

    #[error(
        "{name} is out of bounds: region({x},{y},{width},{height}) image({image_width}x{image_height})"
    )]
    Overflow {
        name: String,
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        image_width: u32,
        image_height: u32,
    },
}

impl RegionError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::RegionOutOfBound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::RegionOutOfBound).unwrap();
        assert_eq!(json, "\"REGION_OUT_OF_BOUND\"");
    }

    #[test]
    fn test_region_error_message() {
        let err = RegionError::Overflow {
            name: "ocr_tooth".to_string(),
            x: 10,
            y: 20,
            width: 30,
            height: 40,
            image_width: 25,
            image_height: 50,
        };
        assert_eq!(
            err.to_string(),
            "ocr_tooth is out of bounds: region(10,20,30,40) image(25x50)"
        );
        assert_eq!(err.code(), ErrorCode::RegionOutOfBound);
    }
}

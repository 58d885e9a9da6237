//! Implant parameter extraction from dental planning screenshots.
//!
//! Reads the tooth position code, implant diameter and implant length from
//! three crops of the planning UI. Two crops go through OCR and a text
//! parser; the color-coded reference table is read independently and used
//! to validate or correct the OCR result.

pub mod capture;
pub mod combinations;
pub mod config;
pub mod error;
pub mod logging;
pub mod ocr;
pub mod paths;
pub mod pipeline;
pub mod reconcile;
pub mod table;
pub mod tune;

pub use pipeline::{ExtractionPipeline, PipelineOutput, PipelineStatus};

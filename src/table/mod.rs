//! Color-coded reference table reader.
//!
//! Finds the red selection marker in the table crop and maps it to a
//! (diameter, length) cell from the marker's interior color and position.

pub mod analyzer;
pub mod color;
pub mod components;

pub use analyzer::{DIAMETERS, LENGTHS, analyze, analyze_bytes};
pub use color::{ColorBand, classify, is_selection_red};
pub use components::{Component, find_components, find_red_components};

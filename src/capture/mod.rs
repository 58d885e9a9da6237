//! Region handling for screenshots taken elsewhere.
//!
//! This module provides:
//! - Region normalization, clamping and bounds validation
//! - Cropping the three extraction regions out of a full screenshot

pub mod crop;
pub mod region;

pub use crop::{crop_all, crop_region, CropResult};
pub use region::{assert_region_within_image, clamp_region_to_image, normalize_region, RegionRect};

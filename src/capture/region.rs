//! Screen regions and their validation against a source image.

use serde::{Deserialize, Serialize};

use crate::error::RegionError;

/// A rectangle in full-screen pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl RegionRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl Default for RegionRect {
    fn default() -> Self {
        Self::new(1, 1, 100, 100)
    }
}

/// Moves the origin to non-negative values and forces a size of at least 1×1.
pub fn normalize_region(region: &RegionRect) -> RegionRect {
    RegionRect {
        x: region.x.max(0),
        y: region.y.max(0),
        width: region.width.max(1),
        height: region.height.max(1),
    }
}

/// Normalizes the region, then shrinks it so it fits inside `image_width × image_height`.
///
/// The origin is pulled inside the image first, so the result always keeps at
/// least one pixel for a non-empty image.
pub fn clamp_region_to_image(region: &RegionRect, image_width: u32, image_height: u32) -> RegionRect {
    let normalized = normalize_region(region);
    let image_w = image_width.min(i32::MAX as u32) as i32;
    let image_h = image_height.min(i32::MAX as u32) as i32;

    let left = normalized.x.clamp(0, (image_w - 1).max(0));
    let top = normalized.y.clamp(0, (image_h - 1).max(0));

    RegionRect {
        x: left,
        y: top,
        width: normalized.width.min(image_w - left),
        height: normalized.height.min(image_h - top),
    }
}

/// Fails unless the region lies fully inside the image and is at least 1×1.
pub fn assert_region_within_image(
    region: &RegionRect,
    image_width: u32,
    image_height: u32,
    name: &str,
) -> Result<(), RegionError> {
    if region.x < 0 || region.y < 0 {
        return Err(RegionError::NegativeOrigin {
            name: name.to_string(),
        });
    }

    if region.width < 1 || region.height < 1 {
        return Err(RegionError::Degenerate {
            name: name.to_string(),
        });
    }

    let right = region.x as i64 + region.width as i64;
    let bottom = region.y as i64 + region.height as i64;
    if right > image_width as i64 || bottom > image_height as i64 {
        return Err(RegionError::Overflow {
            name: name.to_string(),
            x: region.x as i64,
            y: region.y as i64,
            width: region.width as i64,
            height: region.height as i64,
            image_width,
            image_height,
        });
    }

    Ok(())
}

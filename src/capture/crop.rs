use image::RgbaImage;
use tracing::debug;

use super::region::{assert_region_within_image, clamp_region_to_image, RegionRect};
use crate::config::Regions;
use crate::error::RegionError;

/// The three crops handed to the extraction core.
#[derive(Clone, Debug)]
pub struct CropResult {
    pub ocr_tooth: RgbaImage,
    pub ocr_extra: RgbaImage,
    pub table: RgbaImage,
}

/// Crops one region after clamping it to the image and validating the result.
pub fn crop_region(img: &RgbaImage, region: &RegionRect, name: &str) -> Result<RgbaImage, RegionError> {
    let (w, h) = img.dimensions();
    let clamped = clamp_region_to_image(region, w, h);
    assert_region_within_image(&clamped, w, h, name)?;

    debug!(
        region = name,
        x = clamped.x,
        y = clamped.y,
        width = clamped.width,
        height = clamped.height,
        "cropping"
    );

    Ok(image::imageops::crop_imm(
        img,
        clamped.x as u32,
        clamped.y as u32,
        clamped.width as u32,
        clamped.height as u32,
    )
    .to_image())
}

/// Cuts the position-code, data-block and table crops out of a full screenshot.
pub fn crop_all(img: &RgbaImage, regions: &Regions) -> Result<CropResult, RegionError> {
    Ok(CropResult {
        ocr_tooth: crop_region(img, &regions.ocr_tooth, "ocr_tooth")?,
        ocr_extra: crop_region(img, &regions.ocr_extra, "ocr_extra")?,
        table: crop_region(img, &regions.table, "table")?,
    })
}

use anyhow::{Context, Result, bail};
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use tracing::debug;

use super::color::{BandTally, classify};
use super::components::{Component, find_red_components};
use crate::combinations::is_valid_pair;
use crate::ocr::{TableAnalysisResult, TableConfidence};

/// Upscale factor applied before labeling.
const SCALE: u32 = 3;
/// Row labels, top to bottom.
pub const LENGTHS: [&str; 8] = ["13.0", "11.5", "10.0", "8.5", "7.0", "6.0", "5.0", "4.0"];
/// Column labels, left to right.
pub const DIAMETERS: [&str; 5] = ["3.0", "3.5", "4.0", "4.5", "5.0"];
/// Share of the crop height taken by the header row.
const HEADER_FRAC: f64 = 0.10;
/// Share of the marker bounding box trimmed from each side before sampling.
const SAMPLE_INSET: f64 = 0.20;
const SAMPLE_STEP: usize = 2;

/// Reads the selected (diameter, length) cell from the reference table crop.
///
/// The table has one column per diameter, each filled with its own color, and
/// one row per length under a header band. The selected cell is outlined in
/// red; a selected Ø5.0 cell is solid red instead.
pub fn analyze(image: &DynamicImage) -> TableAnalysisResult {
    match try_analyze(image) {
        Ok(result) => result,
        Err(e) => TableAnalysisResult::undetected(format!("{:#}", e)),
    }
}

/// Like [`analyze`], decoding first. Decode failures are reported in the result.
pub fn analyze_bytes(bytes: &[u8]) -> TableAnalysisResult {
    match image::load_from_memory(bytes).context("Failed to decode table image") {
        Ok(img) => analyze(&img),
        Err(e) => TableAnalysisResult::undetected(format!("{:#}", e)),
    }
}

fn try_analyze(image: &DynamicImage) -> Result<TableAnalysisResult> {
    if image.width() == 0 || image.height() == 0 {
        bail!("empty table image");
    }
    if !image.color().has_color() {
        bail!("table image has too few color channels");
    }

    let scaled = image
        .resize_exact(image.width() * SCALE, image.height() * SCALE, FilterType::Lanczos3)
        .to_rgb8();

    let components = find_red_components(&scaled);
    debug!("Table: {} red components", components.len());

    // Largest outline wins; otherwise the largest non-noise red blob is a selected Ø5.0 cell
    let border = components.iter().find(|c| c.is_border_marker());
    let filled = || components.iter().find(|c| !c.is_noise());
    let Some(marker) = border.or_else(filled) else {
        return Ok(TableAnalysisResult::undetected("no red selection marker detected"));
    };
    let (center_x, center_y) = marker.centroid();

    let diameter = border
        .and_then(|c| sample_interior(&scaled, c).dominant())
        .map(|band| band.diameter())
        .unwrap_or_else(|| column_from_x(center_x, scaled.width()));
    let length = row_from_y(center_y, scaled.height());

    let confidence = if border.is_some() && is_valid_pair(diameter, length) {
        TableConfidence::High
    } else {
        TableConfidence::Low
    };

    debug!(
        "Table marker at ({:.0}, {:.0}) border={} fill={:.2} → Ø{} × {} ({:?})",
        center_x,
        center_y,
        border.is_some(),
        marker.fill_ratio(),
        diameter,
        length,
        confidence
    );

    Ok(TableAnalysisResult {
        detected: true,
        diameter: Some(diameter.to_string()),
        length: Some(length.to_string()),
        confidence,
        error: None,
    })
}

/// Tallies column colors inside the outline, skipping the border itself.
fn sample_interior(img: &RgbImage, c: &Component) -> BandTally {
    let inset_x = ((c.bbox_width() as f64 * SAMPLE_INSET).round() as u32).max(1);
    let inset_y = ((c.bbox_height() as f64 * SAMPLE_INSET).round() as u32).max(1);

    let mut tally = BandTally::default();
    let (Some(max_x), Some(max_y)) = (c.max_x.checked_sub(inset_x), c.max_y.checked_sub(inset_y)) else {
        return tally;
    };

    for y in (c.min_y + inset_y..=max_y).step_by(SAMPLE_STEP) {
        for x in (c.min_x + inset_x..=max_x).step_by(SAMPLE_STEP) {
            let p = img.get_pixel(x, y);
            if let Some(band) = classify(p[0], p[1], p[2]) {
                tally.add(band);
            }
        }
    }
    tally
}

/// Diameter column under the horizontal position.
pub fn column_from_x(center_x: f64, width: u32) -> &'static str {
    let rel = center_x / width as f64;
    let idx = ((rel * DIAMETERS.len() as f64).floor().max(0.0) as usize).min(DIAMETERS.len() - 1);
    DIAMETERS[idx]
}

/// Length row under the vertical position, below the header band.
pub fn row_from_y(center_y: f64, height: u32) -> &'static str {
    let data_start = height as f64 * HEADER_FRAC;
    let data_height = height as f64 - data_start;
    let rel = ((center_y - data_start) / data_height).max(0.0);
    let idx = ((rel * LENGTHS.len() as f64).floor() as usize).min(LENGTHS.len() - 1);
    LENGTHS[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Rgb};

    const CELL_W: u32 = 40;
    const CELL_H: u32 = 27;
    const HEADER_H: u32 = 24;
    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const RED: Rgb<u8> = Rgb([220, 40, 40]);
    const PINK: Rgb<u8> = Rgb([240, 110, 110]);
    const COLUMN_FILL: [Rgb<u8>; 5] = [
        Rgb([230, 120, 30]),
        Rgb([240, 220, 50]),
        Rgb([60, 180, 60]),
        Rgb([50, 90, 200]),
        PINK,
    ];

    enum Selection {
        Outline { col: u32, row: u32 },
        Solid { col: u32, row: u32 },
        Nothing,
    }

    /// 5×8 grid with a white header band and 1px white separators.
    fn render_table(selection: Selection) -> DynamicImage {
        let width = CELL_W * 5;
        let height = HEADER_H + CELL_H * 8;
        let mut img = RgbImage::from_pixel(width, height, WHITE);

        for col in 0..5 {
            for row in 0..8 {
                let (x0, y0) = (col * CELL_W, HEADER_H + row * CELL_H);
                for y in y0 + 1..y0 + CELL_H {
                    for x in x0 + 1..x0 + CELL_W {
                        img.put_pixel(x, y, COLUMN_FILL[col as usize]);
                    }
                }
            }
        }

        match selection {
            Selection::Outline { col, row } => {
                let (x0, y0) = (col * CELL_W, HEADER_H + row * CELL_H);
                for y in y0 + 1..y0 + CELL_H {
                    for x in x0 + 1..x0 + CELL_W {
                        let edge = x < x0 + 3 || x >= x0 + CELL_W - 2 || y < y0 + 3 || y >= y0 + CELL_H - 2;
                        if edge {
                            img.put_pixel(x, y, RED);
                        }
                    }
                }
            }
            Selection::Solid { col, row } => {
                let (x0, y0) = (col * CELL_W, HEADER_H + row * CELL_H);
                for y in y0 + 1..y0 + CELL_H {
                    for x in x0 + 1..x0 + CELL_W {
                        img.put_pixel(x, y, RED);
                    }
                }
            }
            Selection::Nothing => {}
        }

        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_outline_on_green_column() {
        let result = analyze(&render_table(Selection::Outline { col: 2, row: 2 }));
        assert!(result.detected);
        assert_eq!(result.diameter.as_deref(), Some("4.0"));
        assert_eq!(result.length.as_deref(), Some("10.0"));
        assert_eq!(result.confidence, TableConfidence::High);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_outline_every_row_of_blue_column() {
        for (row, expected) in LENGTHS.iter().enumerate() {
            let result = analyze(&render_table(Selection::Outline { col: 3, row: row as u32 }));
            assert_eq!(result.diameter.as_deref(), Some("4.5"), "row {}", row);
            assert_eq!(result.length.as_deref(), Some(*expected), "row {}", row);
        }
    }

    #[test]
    fn test_invalid_pair_is_low_confidence() {
        // Ø3.0 has no 6.0mm implant
        let result = analyze(&render_table(Selection::Outline { col: 0, row: 5 }));
        assert!(result.detected);
        assert_eq!(result.diameter.as_deref(), Some("3.0"));
        assert_eq!(result.length.as_deref(), Some("6.0"));
        assert_eq!(result.confidence, TableConfidence::Low);
    }

    #[test]
    fn test_solid_red_cell_uses_position() {
        let result = analyze(&render_table(Selection::Solid { col: 4, row: 4 }));
        assert!(result.detected);
        assert_eq!(result.diameter.as_deref(), Some("5.0"));
        assert_eq!(result.length.as_deref(), Some("7.0"));
        assert_eq!(result.confidence, TableConfidence::Low);
    }

    #[test]
    fn test_no_marker() {
        let result = analyze(&render_table(Selection::Nothing));
        assert!(!result.detected);
        assert_eq!(result.confidence, TableConfidence::None);
        assert_eq!(result.error.as_deref(), Some("no red selection marker detected"));
    }

    #[test]
    fn test_red_specks_alone_are_not_a_marker() {
        let mut img = match render_table(Selection::Nothing) {
            DynamicImage::ImageRgb8(img) => img,
            other => other.to_rgb8(),
        };
        for (x, y) in [(10, 40), (70, 100), (150, 200)] {
            img.put_pixel(x, y, image::Rgb([220, 20, 20]));
            img.put_pixel(x + 1, y, image::Rgb([220, 20, 20]));
        }
        let result = analyze(&DynamicImage::ImageRgb8(img));
        assert!(!result.detected);
        assert_eq!(result.diameter, None);
        assert_eq!(result.confidence, TableConfidence::None);
    }

    #[test]
    fn test_grayscale_image_is_rejected() {
        let result = analyze(&DynamicImage::ImageLuma8(GrayImage::new(20, 20)));
        assert!(!result.detected);
        assert_eq!(result.confidence, TableConfidence::None);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_undecodable_bytes() {
        let result = analyze_bytes(b"definitely not a png");
        assert!(!result.detected);
        assert_eq!(result.confidence, TableConfidence::None);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_position_helpers() {
        assert_eq!(column_from_x(0.0, 500), "3.0");
        assert_eq!(column_from_x(250.0, 500), "4.0");
        assert_eq!(column_from_x(500.0, 500), "5.0");

        // Inside the header clamps to the first row
        assert_eq!(row_from_y(5.0, 1000), "13.0");
        assert_eq!(row_from_y(1000.0, 1000), "4.0");
        assert_eq!(row_from_y(100.0 + 900.0 * 2.5 / 8.0, 1000), "10.0");
    }
}

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, Luma};

use super::types::PreprocessOptions;

/// Unsharp-mask radius used when `sharpen` is on.
const SHARPEN_SIGMA: f32 = 1.5;

/// Runs the OCR preprocessing pipeline on an encoded image.
///
/// Decoding errors are returned to the caller; there is no fallback.
pub fn preprocess_bytes(bytes: &[u8], opts: &PreprocessOptions) -> Result<DynamicImage> {
    let img = image::load_from_memory(bytes).context("Failed to decode image for preprocessing")?;
    Ok(preprocess(&img, opts))
}

/// Full preprocessing pipeline: grayscale → contrast → sharpen → scale → threshold.
///
/// The order is fixed; every step is skipped when its option is neutral.
pub fn preprocess(image: &DynamicImage, opts: &PreprocessOptions) -> DynamicImage {
    let mut img = if opts.grayscale {
        DynamicImage::ImageLuma8(image.to_luma8())
    } else {
        image.clone()
    };

    if opts.contrast != 1.0 {
        img = apply_contrast(&img, opts.contrast);
    }

    if opts.sharpen {
        img = img.unsharpen(SHARPEN_SIGMA, 0);
    }

    if opts.scale != 1.0 {
        img = scale(&img, opts.scale);
    }

    if opts.threshold > 0 {
        img = DynamicImage::ImageLuma8(binarize(&img.to_luma8(), opts.threshold));
    }

    img
}

/// Linear contrast pivoted at mid-gray: `out = c·in + (128 − 128·c)`.
pub fn contrast_value(value: u8, contrast: f32) -> u8 {
    let out = contrast * value as f32 + (128.0 - 128.0 * contrast);
    out.round().clamp(0.0, 255.0) as u8
}

fn apply_contrast(img: &DynamicImage, contrast: f32) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(gray) => {
            let mut out = gray.clone();
            for pixel in out.pixels_mut() {
                pixel[0] = contrast_value(pixel[0], contrast);
            }
            DynamicImage::ImageLuma8(out)
        }
        other => {
            let mut out = other.to_rgba8();
            for pixel in out.pixels_mut() {
                // Alpha is left untouched
                for channel in 0..3 {
                    pixel[channel] = contrast_value(pixel[channel], contrast);
                }
            }
            DynamicImage::ImageRgba8(out)
        }
    }
}

/// Scales by `factor` with Lanczos3. Width and height are rounded independently.
pub fn scale(img: &DynamicImage, factor: f32) -> DynamicImage {
    let (width, height) = img.dimensions();
    let (new_width, new_height) = scaled_dimensions(width, height, factor);
    img.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

pub fn scaled_dimensions(width: u32, height: u32, factor: f32) -> (u32, u32) {
    let w = ((width as f32 * factor).round() as u32).max(1);
    let h = ((height as f32 * factor).round() as u32).max(1);
    (w, h)
}

/// Hard threshold: pixels ≥ `threshold` become white, the rest black.
pub fn binarize(img: &GrayImage, threshold: u8) -> GrayImage {
    let mut output = GrayImage::new(img.width(), img.height());

    for (x, y, pixel) in img.enumerate_pixels() {
        let value = if pixel[0] >= threshold { 255u8 } else { 0u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let img: RgbImage = ImageBuffer::from_fn(width, height, |x, _| {
            let v = (x * 255 / width.max(1)) as u8;
            Rgb([v, v, v])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn neutral() -> PreprocessOptions {
        PreprocessOptions {
            grayscale: false,
            contrast: 1.0,
            scale: 1.0,
            threshold: 0,
            sharpen: false,
        }
    }

    #[test]
    fn test_contrast_pivots_at_mid_gray() {
        assert_eq!(contrast_value(128, 2.0), 128);
        assert_eq!(contrast_value(138, 2.0), 148);
        assert_eq!(contrast_value(118, 2.0), 108);
        // Clamped at both ends
        assert_eq!(contrast_value(250, 3.0), 255);
        assert_eq!(contrast_value(10, 3.0), 0);
        // contrast 0 flattens everything to mid-gray
        assert_eq!(contrast_value(0, 0.0), 128);
        assert_eq!(contrast_value(255, 0.0), 128);
    }

    #[test]
    fn test_neutral_options_keep_pixels() {
        let img = gradient(10, 4);
        let out = preprocess(&img, &neutral());
        assert_eq!(out.to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn test_grayscale_output() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([200, 10, 10])));
        let opts = PreprocessOptions {
            grayscale: true,
            ..neutral()
        };
        assert!(matches!(preprocess(&img, &opts), DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn test_sharpen_runs_before_scale() {
        let img: GrayImage = ImageBuffer::from_fn(12, 6, |x, _| Luma([if x < 6 { 40 } else { 210 }]));
        let img = DynamicImage::ImageLuma8(img);
        let opts = PreprocessOptions {
            sharpen: true,
            scale: 3.0,
            ..neutral()
        };

        let out = preprocess(&img, &opts).to_luma8();
        let sharpened_first = img
            .unsharpen(SHARPEN_SIGMA, 0)
            .resize_exact(36, 18, FilterType::Lanczos3)
            .to_luma8();
        let scaled_first = img
            .resize_exact(36, 18, FilterType::Lanczos3)
            .unsharpen(SHARPEN_SIGMA, 0)
            .to_luma8();
        assert_eq!(out, sharpened_first);
        assert_ne!(out, scaled_first);
    }

    #[test]
    fn test_scale_rounds_each_dimension() {
        assert_eq!(scaled_dimensions(10, 3, 2.5), (25, 8));
        assert_eq!(scaled_dimensions(1, 1, 0.1), (1, 1));

        let img = gradient(10, 3);
        let opts = PreprocessOptions {
            scale: 2.5,
            ..neutral()
        };
        assert_eq!(preprocess(&img, &opts).dimensions(), (25, 8));
    }

    #[test]
    fn test_threshold_binarizes() {
        let img = gradient(16, 2);
        let opts = PreprocessOptions {
            grayscale: true,
            threshold: 128,
            ..neutral()
        };
        let out = preprocess(&img, &opts).to_luma8();
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(15, 0)[0], 255);
    }

    #[test]
    fn test_binarize_boundary_is_white() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[99u8, 100, 101][x as usize]]));
        let out = binarize(&img, 100);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(1, 0)[0], 255);
        assert_eq!(out.get_pixel(2, 0)[0], 255);
    }

    #[test]
    fn test_preprocess_bytes_rejects_garbage() {
        assert!(preprocess_bytes(b"not an image", &PreprocessOptions::default()).is_err());
    }

    #[test]
    fn test_preprocess_bytes_decodes_png() {
        let img = gradient(8, 8);
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let out = preprocess_bytes(&bytes, &PreprocessOptions::default()).unwrap();
        assert_eq!(out.dimensions(), (24, 24));
    }
}

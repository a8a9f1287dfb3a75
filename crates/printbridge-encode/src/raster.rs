// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster conversion for thermal receipt printers.
//
// Decodes an image, flattens transparency onto white, scales it to the
// printable width with Lanczos3, converts to grayscale and packs one bit
// per dot.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use printbridge_core::error::{BridgeError, Result};
use tracing::{debug, instrument};

/// A 1-bit image packed MSB-first, `width_bytes` per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    /// Width in dots.
    pub width: u32,
    pub height: u32,
    /// Bytes per row, `ceil(width / 8)`.
    pub width_bytes: u32,
    pub data: Vec<u8>,
}

/// Widest raster accepted, in dots.
pub const MAX_RASTER_DOTS: u32 = 4096;
/// Tallest raster accepted, in rows (the GS v 0 height field is 16 bits).
pub const MAX_RASTER_ROWS: u32 = u16::MAX as u32;

/// Dot width of a `width_mm` wide image at `dpi`, rounded to the nearest dot.
pub fn target_width(width_mm: f64, dpi: u32) -> u32 {
    (width_mm / 25.4 * f64::from(dpi)).round().max(1.0) as u32
}

/// Decode `bytes` and convert them into a raster `width_mm` wide.
#[instrument(skip(bytes), fields(bytes_len = bytes.len()))]
pub fn rasterize(bytes: &[u8], width_mm: f64, threshold: u8, dpi: u32) -> Result<Raster> {
    if !(width_mm.is_finite() && width_mm > 0.0) {
        return Err(BridgeError::ImageError(format!(
            "invalid raster width: {width_mm} mm"
        )));
    }

    let width = target_width(width_mm, dpi);
    if width > MAX_RASTER_DOTS {
        return Err(BridgeError::Encode(format!(
            "raster width {width} dots exceeds {MAX_RASTER_DOTS}"
        )));
    }

    let decoded = image::load_from_memory(bytes)
        .map_err(|err| BridgeError::ImageError(format!("failed to decode image: {err}")))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(BridgeError::ImageError("image has no pixels".into()));
    }

    let flat = flatten_on_white(&decoded);

    let height = (f64::from(decoded.height()) * f64::from(width) / f64::from(decoded.width()))
        .round()
        .max(1.0);
    if height > f64::from(MAX_RASTER_ROWS) {
        return Err(BridgeError::Encode(format!(
            "raster height {height} rows exceeds {MAX_RASTER_ROWS}"
        )));
    }
    let height = height as u32;
    let resized = imageops::resize(&flat, width, height, FilterType::Lanczos3);
    let gray = DynamicImage::ImageRgb8(resized).to_luma8();

    debug!(
        source_width = decoded.width(),
        source_height = decoded.height(),
        width,
        height,
        "Image rasterized"
    );
    Ok(pack_raster(&gray, threshold))
}

/// Composite any alpha channel over a white background.
fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u32::from(pixel[3]);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    out
}

/// Pack a grayscale image into printer dots.
///
/// A dot is set when its sample is strictly below `threshold`. Columns past
/// the image width in the last byte of each row stay unset.
pub fn pack_raster(gray: &GrayImage, threshold: u8) -> Raster {
    let (width, height) = gray.dimensions();
    let width_bytes = width.div_ceil(8);
    let mut data = Vec::with_capacity((width_bytes * height) as usize);

    for y in 0..height {
        for x_byte in 0..width_bytes {
            let mut byte = 0u8;
            for bit in 0..8 {
                let x = x_byte * 8 + bit;
                if x < width && gray.get_pixel(x, y)[0] < threshold {
                    byte |= 0x80 >> bit;
                }
            }
            data.push(byte);
        }
    }

    Raster {
        width,
        height,
        width_bytes,
        data,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Luma, Rgba, RgbaImage};

    use super::*;

    fn png(image: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode png");
        buf
    }

    #[test]
    fn black_row_packs_to_ff() {
        let black = GrayImage::from_pixel(16, 1, Luma([0]));
        let raster = pack_raster(&black, 128);
        assert_eq!(raster.width_bytes, 2);
        assert_eq!(raster.data, vec![0xFF, 0xFF]);
    }

    #[test]
    fn white_row_packs_to_zero() {
        let white = GrayImage::from_pixel(16, 1, Luma([255]));
        assert_eq!(pack_raster(&white, 128).data, vec![0x00, 0x00]);
    }

    #[test]
    fn threshold_is_strict() {
        let gray = GrayImage::from_pixel(8, 1, Luma([128]));
        assert_eq!(pack_raster(&gray, 128).data, vec![0x00]);
        assert_eq!(pack_raster(&gray, 129).data, vec![0xFF]);
    }

    #[test]
    fn trailing_bits_stay_clear() {
        let black = GrayImage::from_pixel(10, 2, Luma([0]));
        let raster = pack_raster(&black, 128);
        assert_eq!(raster.width_bytes, 2);
        assert_eq!(raster.data, vec![0xFF, 0xC0, 0xFF, 0xC0]);
    }

    #[test]
    fn bits_are_msb_first() {
        let mut gray = GrayImage::from_pixel(8, 1, Luma([255]));
        gray.put_pixel(0, 0, Luma([0]));
        gray.put_pixel(7, 0, Luma([0]));
        assert_eq!(pack_raster(&gray, 128).data, vec![0x81]);
    }

    #[test]
    fn target_width_rounds() {
        assert_eq!(target_width(72.0, 203), 575);
        assert_eq!(target_width(48.0, 203), 384);
    }

    #[test]
    fn decoded_png_is_scaled_to_width() {
        let source = DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 8, Luma([0])));
        let raster = rasterize(&png(source), 48.0, 160, 203).unwrap();
        assert_eq!(raster.width, 384);
        assert_eq!(raster.height, 96);
        assert_eq!(raster.data.len(), 48 * 96);
        assert!(raster.data.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn transparent_pixels_become_white() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 4, Rgba([0, 0, 0, 0])));
        let raster = rasterize(&png(source), 16.0 * 25.4 / 203.0, 128, 203).unwrap();
        assert_eq!(raster.width, 16);
        assert!(raster.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn oversized_width_is_refused_before_decoding() {
        assert_eq!(target_width(1e9, 203), u32::MAX);
        let err = rasterize(b"never decoded", 1e9, 160, 203).unwrap_err();
        assert!(matches!(err, BridgeError::Encode(_)));

        let source = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([0])));
        let err = rasterize(&png(source), 600.0, 160, 203).unwrap_err();
        assert!(matches!(err, BridgeError::Encode(_)));
    }

    #[test]
    fn extreme_aspect_ratio_is_refused() {
        let source = DynamicImage::ImageLuma8(GrayImage::from_pixel(1, 400, Luma([0])));
        let err = rasterize(&png(source), 72.0, 160, 203).unwrap_err();
        assert!(matches!(err, BridgeError::Encode(_)));
    }

    #[test]
    fn garbage_is_an_image_error() {
        let err = rasterize(b"not an image", 72.0, 160, 203).unwrap_err();
        assert!(matches!(err, BridgeError::ImageError(_)));
    }
}

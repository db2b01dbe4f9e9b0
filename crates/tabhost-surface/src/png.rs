//! Small PNG helpers for captures and placeholder snapshots.

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

/// Encode a `width` x `height` image filled with one RGBA color as PNG.
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Result<Vec<u8>, image::ImageError> {
    let img = RgbaImage::from_pixel(width.max(1), height.max(1), Rgba(rgba));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

pub mod font;
pub mod layout;
pub mod og;
pub mod render;
pub mod svg;

use std::io::Cursor;

use anyhow::Result;
use image::{DynamicImage, ImageFormat};

pub fn encode_image(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    match format {
        // JPEG has no alpha channel
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut out, format)?,
        _ => image.write_to(&mut out, format)?,
    }
    Ok(out.into_inner())
}

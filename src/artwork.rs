#![forbid(unsafe_code)]

//! Square cover art cut out of a video thumbnail.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use std::io::Cursor;

/// Centered square crop box `(x, y, side)` for a `width` × `height` image.
pub fn centered_square(width: u32, height: u32) -> (u32, u32, u32) {
    if width > height {
        ((width - height) / 2, 0, height)
    } else {
        (0, (height - width) / 2, width)
    }
}

/// Shrinks the image to fit a `size` × `size` box (never enlarging it), cuts
/// the centered square and returns it.
pub fn square_thumbnail(image: &DynamicImage, size: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    let fitted = if width > size || height > size {
        image.resize(size, size, FilterType::Lanczos3)
    } else {
        image.clone()
    };
    let (width, height) = fitted.dimensions();
    let (x, y, side) = centered_square(width, height);
    fitted.crop_imm(x, y, side, side)
}

/// Decodes a downloaded thumbnail and returns the square cover as PNG bytes.
pub fn square_png(bytes: &[u8], size: u32) -> Result<Vec<u8>, image::ImageError> {
    let image = image::load_from_memory(bytes)?;
    let square = square_thumbnail(&image, size);
    let mut png = Vec::new();
    square.write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)?;
    Ok(png)
}

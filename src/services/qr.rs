//! QR code images for mobile viewing.

use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;
use thiserror::Error;

/// Minimum edge length of the rendered image in pixels.
const QR_MIN_SIZE: u32 = 600;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("cannot encode QR data: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("cannot write PNG: {0}")]
    Image(#[from] image::ImageError),
}

/// Render `data` as a black-on-white PNG with a quiet zone.
///
/// Uses the highest error-correction level so the code survives printing
/// and partial damage.
pub fn render_png(data: &str) -> Result<Vec<u8>, QrError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::H)?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
        .quiet_zone(true)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(image).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

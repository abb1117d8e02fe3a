//! Image encoding: `DynamicImage` → base64 PNG for the recognizer wire format.
//!
//! PNG is lossless; JPEG ringing around glyph edges shifts the ink the
//! structure model sees relative to the token boxes, which matters when cell
//! boundaries are only a few pixels wide at 100 DPI.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use serde::Serialize;
use std::io::Cursor;
use tracing::debug;

/// A page image ready to be embedded in a JSON request body.
#[derive(Debug, Clone, Serialize)]
pub struct EncodedImage {
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
    /// Base64 (standard alphabet, padded) PNG bytes.
    pub data: String,
}

/// Encode a rasterised page as a base64 PNG.
pub fn encode_page(img: &DynamicImage) -> Result<EncodedImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let data = STANDARD.encode(&buf);
    debug!("Encoded {}x{} image → {} bytes base64", img.width(), img.height(), data.len());

    Ok(EncodedImage {
        mime_type: "image/png",
        width: img.width(),
        height: img.height(),
        data,
    })
}

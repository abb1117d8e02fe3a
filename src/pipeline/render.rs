//! Page rasterisation: render one page to a `DynamicImage` via pdfium.
//!
//! The bitmap size is derived from the page's displayed size (crop box,
//! turned by `/Rotate`) through the same [`PageFrame`] and [`Dpi::to_pixels`]
//! used for token boxes, so a word box computed by
//! [`crate::pipeline::tokens`] addresses exactly the pixels it covers.
//! Only the requested page is rendered; a document is never rasterised as a
//! whole.

use crate::config::Dpi;
use crate::pipeline::tokens::PageFrame;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

/// Pixel dimensions of a page rendered at `dpi`.
pub fn page_pixel_size(width_pt: f32, height_pt: f32, dpi: Dpi) -> (i32, i32) {
    (dpi.to_pixels(width_pt).max(1), dpi.to_pixels(height_pt).max(1))
}

/// Render a single page at `dpi`.
///
/// Blocking; call from a `spawn_blocking` worker.
pub fn render_page(page: &PdfPage, dpi: Dpi) -> Result<DynamicImage, PdfiumError> {
    let (width_pt, height_pt) = PageFrame::of_page(page).size();
    let (width, height) = page_pixel_size(width_pt, height_pt, dpi);

    let render_config = PdfRenderConfig::new()
        .set_target_width(width)
        .set_target_height(height);

    let bitmap = page.render_with_config(&render_config)?;
    let image = bitmap.as_image();

    debug!(
        "Rendered page at {} (×{:.3}) → {}x{} px",
        dpi,
        dpi.scale(),
        image.width(),
        image.height()
    );

    Ok(image)
}

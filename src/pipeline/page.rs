//! Page processing: tokens + raster for one page, then recognition.
//!
//! Preparation ([`prepare_page`]) touches pdfium and runs on the blocking
//! worker that owns the document. Recognition ([`recognize_page`]) runs on the
//! async side. Both use the same [`Dpi`], which is what keeps the token boxes
//! and the image in one coordinate space.

use crate::config::Dpi;
use crate::error::PageError;
use crate::pipeline::render::render_page;
use crate::pipeline::tokens::{extract_tokens, Token};
use crate::recognize::{
    PageTables, RecognitionError, RecognitionOutputs, RecognitionRequest, TableRecognizer,
};
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

/// Recognizer inputs for one page, aligned to the same pixel grid.
#[derive(Debug, Clone)]
pub struct PageFeatures {
    /// 0-based page index.
    pub index: usize,
    pub tokens: Vec<Token>,
    pub image: DynamicImage,
}

impl PageFeatures {
    /// 1-indexed page number.
    pub fn page_num(&self) -> usize {
        self.index + 1
    }
}

/// Extract tokens and render the image for page `index` of an open document.
pub fn prepare_page(
    document: &PdfDocument,
    index: usize,
    dpi: Dpi,
) -> Result<PageFeatures, PageError> {
    let page_num = index + 1;
    let render_err = |detail: String| PageError::Render {
        page: page_num,
        detail,
    };

    let page_index =
        u16::try_from(index).map_err(|_| render_err(format!("page index {index} out of range")))?;
    let page = document
        .pages()
        .get(page_index)
        .map_err(|e| render_err(format!("{e:?}")))?;

    let tokens = extract_tokens(&page, dpi).map_err(|e| PageError::Tokens {
        page: page_num,
        detail: format!("{e:?}"),
    })?;
    let image = render_page(&page, dpi).map_err(|e| render_err(format!("{e:?}")))?;

    debug!(
        "Page {}: {} tokens, {}x{} px image",
        page_num,
        tokens.len(),
        image.width(),
        image.height()
    );

    Ok(PageFeatures {
        index,
        tokens,
        image,
    })
}

/// Send one prepared page to the recognizer.
///
/// An empty token list is passed through unchanged: image-only pages are
/// still recognised.
pub async fn recognize_page(
    recognizer: &dyn TableRecognizer,
    features: PageFeatures,
    outputs: RecognitionOutputs,
) -> Result<PageTables, RecognitionError> {
    let page_num = features.page_num();
    if features.tokens.is_empty() {
        debug!("Page {}: no text layer, recognising from image only", page_num);
    }

    recognizer
        .recognize(RecognitionRequest {
            page_num,
            image: features.image,
            tokens: features.tokens,
            outputs,
        })
        .await
}

//! Error types for the pdf-tables library.
//!
//! * [`ExtractError`]: **Fatal** for the request: the document cannot be
//!   turned into a result (unsupported type, unreadable PDF, a page failure
//!   under fail-closed policy, missing pdfium engine).
//!
//! * [`PageError`]: a single page could not be processed. Under
//!   [`crate::config::FailurePolicy::FailClosed`] it is wrapped into
//!   [`ExtractError::PageFailed`]; under best-effort it is stored in the
//!   page's [`crate::output::PageSummary`] and processing continues.
//!
//! Every error carries an [`ErrorKind`] and a [`ExtractError::public_message`]
//! that is safe to return to an HTTP caller. The `Display` output keeps the
//! underlying cause and is meant for server-side logs only.

use crate::recognize::RecognitionError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification used by the upload gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedType,
    ParseFailure,
    RecognitionFailure,
    Internal,
}

/// All fatal errors returned by the extraction entry points.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The upload is not named `*.pdf`; nothing was parsed.
    #[error("Unsupported file type: '{file_name}' is not a PDF")]
    UnsupportedType { file_name: String },

    /// The document could not be opened (corrupt header/xref, encrypted, not
    /// a PDF at all despite the extension).
    #[error("PDF could not be opened: {detail}")]
    ParseFailure { detail: String },

    /// Local input file could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Page errors ───────────────────────────────────────────────────────
    /// A page failed and the run is fail-closed.
    #[error(transparent)]
    PageFailed(#[from] PageError),

    // ── Engine / configuration ────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH (or --pdfium-lib-path) to the directory containing libpdfium."
    )]
    EngineUnavailable(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not write the HTML output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            ExtractError::ParseFailure { .. } => ErrorKind::ParseFailure,
            ExtractError::PageFailed(page) => page.kind(),
            ExtractError::ReadFailed { .. }
            | ExtractError::EngineUnavailable(_)
            | ExtractError::InvalidConfig(_)
            | ExtractError::OutputWriteFailed { .. }
            | ExtractError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// A message that can be shown to an untrusted caller.
    ///
    /// Never contains file-system paths, pdfium error text or recognizer
    /// response bodies.
    pub fn public_message(&self) -> String {
        match self {
            ExtractError::UnsupportedType { .. } => {
                "Only PDF files are allowed for upload".to_string()
            }
            ExtractError::ParseFailure { .. } => {
                "the uploaded file could not be read as a PDF document".to_string()
            }
            ExtractError::PageFailed(page) => page.public_message(),
            _ => "an internal error prevented table extraction".to_string(),
        }
    }
}

/// A failure confined to one page.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PageError {
    /// The page could not be loaded or rasterised.
    #[error("Page {page}: rasterisation failed: {detail}")]
    Render { page: usize, detail: String },

    /// The page's text layer could not be read.
    #[error("Page {page}: text extraction failed: {detail}")]
    Tokens { page: usize, detail: String },

    /// The recognizer rejected or failed on the page.
    #[error("Page {page}: table recognition failed: {detail}")]
    Recognition { page: usize, detail: String },
}

impl PageError {
    /// Wrap a recognizer error for the given 1-indexed page.
    pub fn recognition(page: usize, err: &RecognitionError) -> Self {
        PageError::Recognition {
            page,
            detail: err.to_string(),
        }
    }

    /// 1-indexed page number.
    pub fn page(&self) -> usize {
        match self {
            PageError::Render { page, .. }
            | PageError::Tokens { page, .. }
            | PageError::Recognition { page, .. } => *page,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PageError::Render { .. } | PageError::Tokens { .. } => ErrorKind::ParseFailure,
            PageError::Recognition { .. } => ErrorKind::RecognitionFailure,
        }
    }

    pub fn public_message(&self) -> String {
        match self {
            PageError::Render { page, .. } | PageError::Tokens { page, .. } => {
                format!("page {page} of the PDF could not be read")
            }
            PageError::Recognition { page, .. } => {
                format!("table recognition failed on page {page}")
            }
        }
    }
}

//! # pdf-tables
//!
//! Extract every table of a PDF as HTML by pairing each page's text layer with
//! a raster of the same page and handing both to a table-recognition model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (file name + bytes)
//!  │
//!  ├─ 1. Gate     reject anything not named *.pdf
//!  ├─ 2. Open     pdfium, once, on a blocking worker
//!  ├─ 3. Tokens   text layer → words, boxes scaled by dpi/72 and floored
//!  ├─ 4. Render   the same page at the same dpi
//!  ├─ 5. Detect   recognizer(image, tokens) → objects, cells, HTML, CSV
//!  └─ 6. Collect  per-page HTML concatenated in page order
//! ```
//!
//! Pages go through steps 3–5 one at a time, in document order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_tables::{ExtractionConfig, HttpRecognizer, HttpRecognizerConfig, TableExtractor};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let recognizer = HttpRecognizer::new(HttpRecognizerConfig::new(
//!         "http://127.0.0.1:9000/recognize",
//!     ))?;
//!     let extractor = TableExtractor::new(Arc::new(recognizer), ExtractionConfig::default());
//!     let result = extractor.extract_file("statement.pdf").await?;
//!     println!("{}", result.html);
//!     eprintln!("{} tables on {} pages", result.stats.table_count, result.stats.total_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-tables` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod recognize;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Dpi, ExtractionConfig, ExtractionConfigBuilder, FailurePolicy};
pub use engine::PdfEngine;
pub use error::{ErrorKind, ExtractError, PageError};
pub use extract::{is_pdf, TableExtractor};
pub use output::{DocumentResult, ExtractionStats, PageSummary};
pub use pipeline::page::PageFeatures;
pub use pipeline::source::{DocumentSource, PageFeed, PageStream, PdfiumSource};
pub use pipeline::tokens::Token;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use recognize::{
    HttpRecognizer, HttpRecognizerConfig, PageTables, RecognitionError, RecognitionOutputs,
    RecognitionRequest, TableRecognizer,
};
pub use server::{build_router, serve, ServerConfig};

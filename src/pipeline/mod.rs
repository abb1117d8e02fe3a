//! Per-page pipeline stages.
//!
//! ```text
//! source ──▶ tokens + render ──▶ page ──▶ (recognizer)
//! (pdfium)   (same Dpi)          (features → PageTables)
//! ```
//!
//! 1. [`source`]: open the document on a blocking worker and feed pages in
//!    order through a bounded channel
//! 2. [`tokens`]: text layer → word tokens in pixel space
//! 3. [`render`]: one page → `DynamicImage` at the same DPI
//! 4. [`page`]: bundle tokens + image, call the recognizer
//! 5. [`encode`]: PNG + base64 for recognizers that take the image over the wire

pub mod encode;
pub mod page;
pub mod render;
pub mod source;
pub mod tokens;

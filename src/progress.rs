//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to observe a
//! run as it walks the document. Pages are processed strictly in order, so
//! events for page `n + 1` never precede the completion or failure of page `n`.
//!
//! # Example
//!
//! ```rust
//! use pdf_tables::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct TableCounter {
//!     tables: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for TableCounter {
//!     fn on_page_complete(&self, _page_num: usize, _total_pages: usize, table_count: usize) {
//!         self.tables.fetch_add(table_count, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(TableCounter { tables: AtomicUsize::new(0) });
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each page.
///
/// All methods default to no-ops so implementors only override what they
/// care about. Page numbers are 1-indexed.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after the document is opened, before any page is processed.
    fn on_document_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when a page's tokens and image are ready and recognition starts.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when the recognizer returned for a page.
    ///
    /// * `table_count`: number of HTML tables the page contributed
    fn on_page_complete(&self, page_num: usize, total_pages: usize, table_count: usize) {
        let _ = (page_num, total_pages, table_count);
    }

    /// Called when a page failed (render, text layer, or recognition).
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after the last page when the run produced a result.
    ///
    /// Not called when a fail-closed run aborts.
    fn on_document_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        tables: AtomicUsize,
        errors: AtomicUsize,
        completed: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, table_count: usize) {
            self.tables.fetch_add(table_count, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _total_pages: usize, success_count: usize) {
            self.completed.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_document_start(5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 2);
        cb.on_page_error(2, 5, "some error");
        cb.on_document_complete(5, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_page_start(1, 3);
        tracker.on_page_complete(1, 3, 2);
        tracker.on_page_start(2, 3);
        tracker.on_page_complete(2, 3, 0);
        tracker.on_page_start(3, 3);
        tracker.on_page_error(3, 3, "recognizer timeout");
        tracker.on_document_complete(3, 2);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.tables.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completed.load(Ordering::SeqCst), 2);
    }
}

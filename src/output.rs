//! Result types returned by the extraction entry points.

use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// The aggregated result for one uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    /// Every page's HTML table fragments concatenated in page order.
    pub html: String,
    /// One entry per page that was attempted, in page order.
    pub pages: Vec<PageSummary>,
    pub stats: ExtractionStats,
}

impl DocumentResult {
    /// Pages that failed (only non-empty under best-effort policy).
    pub fn failed_pages(&self) -> impl Iterator<Item = &PageError> {
        self.pages.iter().filter_map(|p| p.error.as_ref())
    }
}

/// What happened on a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSummary {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Number of words handed to the recognizer.
    pub token_count: usize,
    /// Number of HTML tables the page contributed.
    pub table_count: usize,
    /// Wall-clock time spent in the recognizer for this page.
    pub recognition_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_pages: usize,
    pub succeeded_pages: usize,
    pub failed_pages: usize,
    pub table_count: usize,
    pub total_duration_ms: u64,
    pub recognition_duration_ms: u64,
}

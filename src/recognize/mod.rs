//! The table-recognition capability consumed by the page processor.
//!
//! Detection and structure recognition are a black box here: given a page
//! image and the page's word tokens in the same pixel space, a
//! [`TableRecognizer`] returns the detected table objects, their cells, and
//! one HTML / CSV rendering per table.
//!
//! The recognizer is constructed once at start-up and injected into
//! [`crate::extract::TableExtractor`] as an `Arc<dyn TableRecognizer>`. It is
//! shared read-only by every request; implementations that cannot serve
//! concurrent calls must serialise internally.

mod http;

pub use http::{HttpRecognizer, HttpRecognizerConfig};

use crate::pipeline::tokens::Token;
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which structures a recognition call should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionOutputs {
    #[serde(rename = "out_objects")]
    pub objects: bool,
    #[serde(rename = "out_cells")]
    pub cells: bool,
    #[serde(rename = "out_html")]
    pub html: bool,
    #[serde(rename = "out_csv")]
    pub csv: bool,
}

impl Default for RecognitionOutputs {
    fn default() -> Self {
        Self {
            objects: true,
            cells: true,
            html: true,
            csv: true,
        }
    }
}

/// Everything the recognizer needs for one page.
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    /// 1-indexed page number, for logging and error reports.
    pub page_num: usize,
    pub image: DynamicImage,
    /// Word tokens in the image's pixel space. May be empty.
    pub tokens: Vec<Token>,
    pub outputs: RecognitionOutputs,
}

/// A detected table region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub label: String,
    pub score: f32,
    /// `[x0, y0, x1, y1]` in page-image pixels.
    pub bbox: [f32; 4],
}

/// One cell of a recognised table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub bbox: [f32; 4],
    #[serde(default)]
    pub row_nums: Vec<usize>,
    #[serde(default)]
    pub column_nums: Vec<usize>,
    #[serde(default)]
    pub column_header: bool,
    #[serde(default)]
    pub cell_text: String,
}

/// The recognizer's output for exactly one page.
///
/// `cells`, `html` and `csv` hold one entry per table, in the order the
/// recognizer reports the tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageTables {
    #[serde(default)]
    pub objects: Vec<DetectedObject>,
    #[serde(default)]
    pub cells: Vec<Vec<TableCell>>,
    #[serde(default)]
    pub html: Vec<String>,
    #[serde(default)]
    pub csv: Vec<String>,
}

/// Failure of a recognition call.
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// The service could not be reached or the connection dropped.
    #[error("recognizer transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("recognizer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered 2xx but the body is not a valid page result.
    #[error("malformed recognizer response: {0}")]
    Malformed(String),

    /// The recognizer refused the input (in-process implementations).
    #[error("recognizer rejected the page: {0}")]
    Rejected(String),
}

/// Detection + structure recognition for a single page.
#[async_trait]
pub trait TableRecognizer: Send + Sync {
    /// Recognise the tables on one page.
    async fn recognize(&self, request: RecognitionRequest) -> Result<PageTables, RecognitionError>;

    /// Short identifier for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_use_wire_flag_names() {
        let json = serde_json::to_value(RecognitionOutputs::default()).unwrap();
        assert_eq!(json["out_objects"], true);
        assert_eq!(json["out_cells"], true);
        assert_eq!(json["out_html"], true);
        assert_eq!(json["out_csv"], true);
    }

    #[test]
    fn page_tables_tolerates_missing_sections() {
        let tables: PageTables =
            serde_json::from_str(r#"{"html": ["<table></table>"]}"#).unwrap();
        assert_eq!(tables.html.len(), 1);
        assert!(tables.objects.is_empty());
        assert!(tables.csv.is_empty());
    }

    #[test]
    fn cells_decode_with_defaults() {
        let tables: PageTables = serde_json::from_str(
            r#"{"cells": [[{"bbox": [1.0, 2.0, 3.0, 4.0], "cell_text": "Total"}]]}"#,
        )
        .unwrap();
        let cell = &tables.cells[0][0];
        assert_eq!(cell.cell_text, "Total");
        assert!(cell.row_nums.is_empty());
        assert!(!cell.column_header);
    }
}

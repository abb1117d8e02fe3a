//! Document orchestration: one uploaded PDF → one aggregated HTML string.
//!
//! [`TableExtractor`] owns the injected recognizer and the document source.
//! For each request it checks the file type, opens the document once, walks
//! the pages in physical order and appends each page's HTML fragments to the
//! running result. Tables are never merged across page boundaries.
//!
//! Failure handling follows [`FailurePolicy`]: fail-closed aborts on the first
//! page error and discards everything aggregated so far; best-effort records
//! the error against the page and moves on.

use crate::config::{ExtractionConfig, FailurePolicy};
use crate::engine::PdfEngine;
use crate::error::{ExtractError, PageError};
use crate::output::{DocumentResult, ExtractionStats, PageSummary};
use crate::pipeline::page::recognize_page;
use crate::pipeline::source::{DocumentSource, PageFeed, PdfiumSource};
use crate::progress::{ExtractionProgressCallback, NoopProgressCallback};
use crate::recognize::TableRecognizer;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// `true` when `file_name` ends in `.pdf`, ignoring case.
pub fn is_pdf(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(".pdf")
}

/// Extracts every table of a PDF as HTML.
///
/// Construct once at start-up and share behind an `Arc`; it holds no
/// per-request state.
///
/// # Example
/// ```rust,no_run
/// use pdf_tables::{ExtractionConfig, HttpRecognizer, HttpRecognizerConfig, TableExtractor};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let recognizer = HttpRecognizer::new(HttpRecognizerConfig::new("http://127.0.0.1:9000/recognize"))?;
/// let extractor = TableExtractor::new(Arc::new(recognizer), ExtractionConfig::default());
/// let result = extractor.extract_file("statement.pdf").await?;
/// println!("{}", result.html);
/// # Ok(())
/// # }
/// ```
pub struct TableExtractor {
    recognizer: Arc<dyn TableRecognizer>,
    source: Arc<dyn DocumentSource>,
    config: ExtractionConfig,
}

impl TableExtractor {
    /// Use pdfium (located via `config.pdfium_library_path`) as the document source.
    pub fn new(recognizer: Arc<dyn TableRecognizer>, config: ExtractionConfig) -> Self {
        let engine = PdfEngine::new(config.pdfium_library_path.clone());
        Self {
            recognizer,
            source: Arc::new(PdfiumSource::new(engine)),
            config,
        }
    }

    /// Replace the document source.
    pub fn with_source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.source = source;
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract the tables of an uploaded file.
    ///
    /// # Errors
    /// - [`ExtractError::UnsupportedType`] when `file_name` is not `*.pdf`;
    ///   the bytes are not inspected.
    /// - [`ExtractError::ParseFailure`] when the document cannot be opened.
    /// - [`ExtractError::PageFailed`] for the first failing page (fail-closed),
    ///   or for the first page when every page failed (best-effort).
    pub async fn extract(
        &self,
        file_name: &str,
        bytes: Bytes,
    ) -> Result<DocumentResult, ExtractError> {
        let start = Instant::now();
        if !is_pdf(file_name) {
            info!("Rejecting '{}': not a PDF", file_name);
            return Err(ExtractError::UnsupportedType {
                file_name: file_name.to_string(),
            });
        }

        info!("Extracting tables from '{}' ({} bytes)", file_name, bytes.len());
        let feed = self.source.open(bytes, self.config.dpi).await?;
        let result = self.process_feed(feed, start).await?;

        info!(
            "Extraction complete: '{}' {}/{} pages, {} tables, {}ms",
            file_name,
            result.stats.succeeded_pages,
            result.stats.total_pages,
            result.stats.table_count,
            result.stats.total_duration_ms
        );
        Ok(result)
    }

    /// Read a local file and extract its tables.
    pub async fn extract_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<DocumentResult, ExtractError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !is_pdf(&file_name) {
            return Err(ExtractError::UnsupportedType { file_name });
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ExtractError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        self.extract(&file_name, Bytes::from(bytes)).await
    }

    /// Extract a local file and write the aggregated HTML to `output_path`.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn extract_to_file(
        &self,
        input_path: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
    ) -> Result<DocumentResult, ExtractError> {
        let result = self.extract_file(input_path).await?;
        let path = output_path.as_ref();
        let write_err = |source| ExtractError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp_path = path.with_extension("html.tmp");
        tokio::fs::write(&tmp_path, &result.html)
            .await
            .map_err(write_err)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

        Ok(result)
    }

    /// Walk the feed in order, recognising and aggregating each page.
    async fn process_feed(
        &self,
        mut feed: PageFeed,
        start: Instant,
    ) -> Result<DocumentResult, ExtractError> {
        let total_pages = feed.total_pages();
        let noop = NoopProgressCallback;
        let progress: &dyn ExtractionProgressCallback = match self.config.progress_callback {
            Some(ref cb) => cb.as_ref(),
            None => &noop,
        };
        progress.on_document_start(total_pages);

        let mut html = String::new();
        let mut pages: Vec<PageSummary> = Vec::with_capacity(total_pages);
        let mut recognition_duration_ms = 0u64;

        while let Some(prepared) = feed.next_page().await {
            let (page_num, token_count, outcome, recognition_ms) = match prepared {
                Ok(features) => {
                    let page_num = features.page_num();
                    let token_count = features.tokens.len();
                    progress.on_page_start(page_num, total_pages);

                    let recog_start = Instant::now();
                    let outcome =
                        recognize_page(self.recognizer.as_ref(), features, self.config.outputs)
                            .await
                            .map_err(|e| PageError::recognition(page_num, &e));
                    let ms = recog_start.elapsed().as_millis() as u64;
                    recognition_duration_ms += ms;
                    (page_num, token_count, outcome, ms)
                }
                Err(page_error) => (page_error.page(), 0, Err(page_error), 0),
            };

            match outcome {
                Ok(tables) => {
                    debug!(
                        "Page {}/{}: {} tables, {} tokens, {}ms",
                        page_num,
                        total_pages,
                        tables.html.len(),
                        token_count,
                        recognition_ms
                    );
                    for fragment in &tables.html {
                        html.push_str(fragment);
                    }
                    progress.on_page_complete(page_num, total_pages, tables.html.len());
                    pages.push(PageSummary {
                        page_num,
                        token_count,
                        table_count: tables.html.len(),
                        recognition_ms,
                        error: None,
                    });
                }
                Err(page_error) => {
                    progress.on_page_error(page_num, total_pages, &page_error.to_string());
                    match self.config.failure_policy {
                        FailurePolicy::FailClosed => {
                            error!(
                                "Aborting after page {}/{} failed: {}",
                                page_num, total_pages, page_error
                            );
                            return Err(page_error.into());
                        }
                        FailurePolicy::BestEffort => {
                            warn!(
                                "Skipping page {}/{}: {}",
                                page_num, total_pages, page_error
                            );
                            pages.push(PageSummary {
                                page_num,
                                token_count,
                                table_count: 0,
                                recognition_ms,
                                error: Some(page_error),
                            });
                        }
                    }
                }
            }
        }

        feed.finish().await?;

        if pages.len() != total_pages {
            return Err(ExtractError::Internal(format!(
                "document source stopped after {} of {} pages",
                pages.len(),
                total_pages
            )));
        }

        let failed_pages = pages.iter().filter(|p| p.error.is_some()).count();
        let succeeded_pages = total_pages - failed_pages;
        if total_pages > 0 && succeeded_pages == 0 {
            if let Some(first) = pages.iter().find_map(|p| p.error.clone()) {
                return Err(first.into());
            }
        }

        let stats = ExtractionStats {
            total_pages,
            succeeded_pages,
            failed_pages,
            table_count: pages.iter().map(|p| p.table_count).sum(),
            total_duration_ms: start.elapsed().as_millis() as u64,
            recognition_duration_ms,
        };

        progress.on_document_complete(total_pages, succeeded_pages);

        Ok(DocumentResult { html, pages, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_pdf_ignores_case() {
        assert!(is_pdf("report.pdf"));
        assert!(is_pdf("REPORT.PDF"));
        assert!(is_pdf("annual.report.Pdf"));
        assert!(!is_pdf("report.docx"));
        assert!(!is_pdf("report.pdf.zip"));
        assert!(!is_pdf("pdf"));
        assert!(!is_pdf(""));
    }
}

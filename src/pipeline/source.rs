//! Document sources: open uploaded bytes and feed prepared pages in order.
//!
//! pdfium is blocking and its handles are not `Send`, so [`PdfiumSource`]
//! opens the document inside `tokio::task::spawn_blocking` and keeps it there.
//! Prepared pages cross to the async side through a channel of capacity one:
//! the worker can get one page ahead of recognition, never more.
//!
//! Dropping the [`PageFeed`] closes the channel; the worker notices on its
//! next send, stops, and drops the document. This is how an aborted request
//! (fail-closed error, client disconnect) releases the document.

use crate::config::Dpi;
use crate::engine::PdfEngine;
use crate::error::{ExtractError, PageError};
use crate::pipeline::page::{prepare_page, PageFeatures};
use async_trait::async_trait;
use bytes::Bytes;
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

/// A boxed stream of prepared pages, in page order.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageFeatures, PageError>> + Send>>;

/// An opened document: its page count and the pages as they are prepared.
pub struct PageFeed {
    total_pages: usize,
    pages: PageStream,
    worker: Option<JoinHandle<()>>,
}

impl PageFeed {
    /// A feed without a background worker (all pages come from `pages`).
    pub fn new(total_pages: usize, pages: PageStream) -> Self {
        Self {
            total_pages,
            pages,
            worker: None,
        }
    }

    /// A feed whose pages are sent by `worker` through `pages`.
    pub fn with_worker(
        total_pages: usize,
        pages: mpsc::Receiver<Result<PageFeatures, PageError>>,
        worker: JoinHandle<()>,
    ) -> Self {
        Self {
            total_pages,
            pages: Box::pin(ReceiverStream::new(pages)),
            worker: Some(worker),
        }
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Next page in order, or `None` once the source is exhausted.
    pub async fn next_page(&mut self) -> Option<Result<PageFeatures, PageError>> {
        self.pages.next().await
    }

    /// Release the pages, then wait for the background worker, surfacing a
    /// panic as an internal error.
    ///
    /// Safe to call with pages still pending: the worker sees the closed
    /// channel and stops after the page it is preparing.
    pub async fn finish(self) -> Result<(), ExtractError> {
        let Self { pages, worker, .. } = self;
        drop(pages);
        if let Some(worker) = worker {
            worker
                .await
                .map_err(|e| ExtractError::Internal(format!("PDF worker panicked: {e}")))?;
        }
        Ok(())
    }
}

/// Opens document bytes and produces a [`PageFeed`].
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn open(&self, bytes: Bytes, dpi: Dpi) -> Result<PageFeed, ExtractError>;
}

/// pdfium-backed [`DocumentSource`].
#[derive(Debug, Clone, Default)]
pub struct PdfiumSource {
    engine: PdfEngine,
}

impl PdfiumSource {
    pub fn new(engine: PdfEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl DocumentSource for PdfiumSource {
    async fn open(&self, bytes: Bytes, dpi: Dpi) -> Result<PageFeed, ExtractError> {
        let (opened_tx, opened_rx) = oneshot::channel();
        let (page_tx, page_rx) = mpsc::channel(1);
        let engine = self.engine.clone();

        let worker = tokio::task::spawn_blocking(move || {
            feed_pages(&engine, &bytes, dpi, opened_tx, page_tx);
        });

        let total_pages = match opened_rx.await {
            Ok(opened) => opened?,
            // The worker dropped the sender without reporting: it panicked.
            Err(_) => {
                let detail = match worker.await {
                    Err(e) => format!("PDF worker panicked: {e}"),
                    Ok(()) => "PDF worker exited before opening the document".to_string(),
                };
                return Err(ExtractError::Internal(detail));
            }
        };

        Ok(PageFeed::with_worker(total_pages, page_rx, worker))
    }
}

/// Blocking worker body: open once, then prepare pages in order.
fn feed_pages(
    engine: &PdfEngine,
    bytes: &[u8],
    dpi: Dpi,
    opened: oneshot::Sender<Result<usize, ExtractError>>,
    pages: mpsc::Sender<Result<PageFeatures, PageError>>,
) {
    let pdfium = match engine.bind() {
        Ok(pdfium) => pdfium,
        Err(e) => {
            let _ = opened.send(Err(e));
            return;
        }
    };

    let document = match pdfium.load_pdf_from_byte_slice(bytes, None) {
        Ok(document) => document,
        Err(e) => {
            let _ = opened.send(Err(ExtractError::ParseFailure {
                detail: format!("{e:?}"),
            }));
            return;
        }
    };

    let total_pages = document.pages().len() as usize;
    info!("PDF loaded: {} pages, rendering at {}", total_pages, dpi);
    if opened.send(Ok(total_pages)).is_err() {
        return;
    }

    send_pages(total_pages, &pages, |index| prepare_page(&document, index, dpi));
}

/// Prepare pages `0..total_pages` in order and send each one, blocking while
/// the channel is full. Stops as soon as the receiver is gone.
///
/// Returns how many pages were prepared. Blocking; call from a
/// `spawn_blocking` worker.
pub fn send_pages<F>(
    total_pages: usize,
    pages: &mpsc::Sender<Result<PageFeatures, PageError>>,
    mut prepare: F,
) -> usize
where
    F: FnMut(usize) -> Result<PageFeatures, PageError>,
{
    for index in 0..total_pages {
        if pages.is_closed() {
            debug!("Page consumer went away; stopping before page {}", index + 1);
            return index;
        }
        let prepared = prepare(index);
        if pages.blocking_send(prepared).is_err() {
            debug!("Page consumer went away; stopping after page {}", index + 1);
            return index + 1;
        }
    }
    total_pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn blank(index: usize) -> PageFeatures {
        PageFeatures {
            index,
            tokens: Vec::new(),
            image: DynamicImage::new_rgb8(8, 8),
        }
    }

    /// A worker-backed feed of `total` blank pages; the counter tracks how
    /// many the worker has prepared.
    fn counting_feed(total: usize) -> (PageFeed, Arc<AtomicUsize>) {
        let prepared = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel(1);
        let counter = prepared.clone();
        let worker = tokio::task::spawn_blocking(move || {
            send_pages(total, &tx, |index| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(blank(index))
            });
        });
        (PageFeed::with_worker(total, rx, worker), prepared)
    }

    #[tokio::test]
    async fn all_pages_arrive_in_order() {
        let (mut feed, prepared) = counting_feed(4);
        let mut seen = Vec::new();
        while let Some(page) = feed.next_page().await {
            seen.push(page.unwrap().index);
        }
        feed.finish().await.unwrap();
        assert_eq!(seen, [0, 1, 2, 3]);
        assert_eq!(prepared.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn abandoning_after_first_page_stops_worker() {
        let (mut feed, prepared) = counting_feed(50);
        assert_eq!(feed.total_pages(), 50);
        let first = feed.next_page().await.unwrap().unwrap();
        assert_eq!(first.index, 0);

        // Page 1 failed under fail-closed: the feed is given up with pages pending.
        tokio::time::timeout(Duration::from_secs(5), feed.finish())
            .await
            .expect("worker kept running after the feed was released")
            .unwrap();

        // Page 1 taken, at most one buffered and one blocked in send.
        let count = prepared.load(Ordering::SeqCst);
        assert!(count <= 3, "prepared {count} of 50 pages");
    }

    #[tokio::test]
    async fn dropped_feed_releases_worker() {
        let prepared = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel(1);
        let (done_tx, done_rx) = oneshot::channel();
        let counter = prepared.clone();
        let worker = tokio::task::spawn_blocking(move || {
            let sent = send_pages(50, &tx, |index| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(blank(index))
            });
            let _ = done_tx.send(sent);
        });
        let mut feed = PageFeed::with_worker(50, rx, worker);
        feed.next_page().await.unwrap().unwrap();
        drop(feed);

        let sent = tokio::time::timeout(Duration::from_secs(5), done_rx)
            .await
            .expect("worker kept running after the feed was dropped")
            .unwrap();
        assert!(sent <= 3, "sent {sent} of 50 pages");
        assert_eq!(prepared.load(Ordering::SeqCst), sent);
    }

    #[tokio::test]
    async fn closed_channel_prepares_nothing() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sent = tokio::task::spawn_blocking(move || {
            send_pages(10, &tx, |_| panic!("prepared a page nobody will read"))
        })
        .await
        .unwrap();
        assert_eq!(sent, 0);
    }
}

//! Test doubles shared by the integration tests.
//!
//! [`FakeSource`] stands in for pdfium and [`ScriptedRecognizer`] for the
//! model service, so the orchestration and the HTTP gateway can be tested
//! without native libraries or GPUs.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use image::DynamicImage;
use pdf_tables::pipeline::source::send_pages;
use pdf_tables::{
    Dpi, DocumentSource, ExtractError, PageError, PageFeatures, PageFeed, PageTables,
    RecognitionError, RecognitionRequest, TableRecognizer, Token,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

// ── Pages ────────────────────────────────────────────────────────────────────

pub fn token(text: &str, x: i32) -> Token {
    Token {
        bbox: [x, 10, x + 40, 22],
        text: text.to_string(),
        flags: 0,
        block_num: 0,
        line_num: 0,
        span_num: 0,
    }
}

/// A prepared page with a small blank image and the given words.
pub fn page(index: usize, words: &[&str]) -> PageFeatures {
    PageFeatures {
        index,
        tokens: words
            .iter()
            .enumerate()
            .map(|(i, w)| token(w, 10 + 50 * i as i32))
            .collect(),
        image: DynamicImage::new_rgb8(85, 110),
    }
}

/// `n` pages, each carrying the word `p<page_num>`.
pub fn pages(n: usize) -> Vec<Result<PageFeatures, PageError>> {
    (0..n)
        .map(|i| Ok(page(i, &[&format!("p{}", i + 1)])))
        .collect()
}

// ── Document source ──────────────────────────────────────────────────────────

/// Serves a fixed list of pages (or a fixed open error) for every request.
pub struct FakeSource {
    pages: Vec<Result<PageFeatures, PageError>>,
    open_error: Option<String>,
    opens: AtomicUsize,
    dpi_seen: Mutex<Vec<Dpi>>,
}

impl FakeSource {
    pub fn new(pages: Vec<Result<PageFeatures, PageError>>) -> Self {
        Self {
            pages,
            open_error: None,
            opens: AtomicUsize::new(0),
            dpi_seen: Mutex::new(Vec::new()),
        }
    }

    /// Every open fails with [`ExtractError::ParseFailure`].
    pub fn unreadable(detail: &str) -> Self {
        Self {
            open_error: Some(detail.to_string()),
            ..Self::new(Vec::new())
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn dpi_seen(&self) -> Vec<Dpi> {
        self.dpi_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentSource for FakeSource {
    async fn open(&self, _bytes: Bytes, dpi: Dpi) -> Result<PageFeed, ExtractError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.dpi_seen.lock().unwrap().push(dpi);
        if let Some(ref detail) = self.open_error {
            return Err(ExtractError::ParseFailure {
                detail: detail.clone(),
            });
        }
        let pages = self.pages.clone();
        Ok(PageFeed::new(
            pages.len(),
            Box::pin(tokio_stream::iter(pages)),
        ))
    }
}

/// Prepares pages on a blocking worker behind a capacity-one channel, the way
/// the pdfium source does, and records how far the worker got.
pub struct WorkerSource {
    total_pages: usize,
    prepared: Arc<AtomicUsize>,
    exits: Mutex<Vec<oneshot::Receiver<usize>>>,
}

impl WorkerSource {
    pub fn new(total_pages: usize) -> Self {
        Self {
            total_pages,
            prepared: Arc::new(AtomicUsize::new(0)),
            exits: Mutex::new(Vec::new()),
        }
    }

    /// Pages prepared so far, across every open.
    pub fn prepared(&self) -> usize {
        self.prepared.load(Ordering::SeqCst)
    }

    /// Wait for the most recent worker to return; yields the pages it sent.
    pub async fn worker_exit(&self) -> usize {
        let exit = self.exits.lock().unwrap().pop().expect("no worker started");
        exit.await.expect("worker panicked")
    }
}

#[async_trait]
impl DocumentSource for WorkerSource {
    async fn open(&self, _bytes: Bytes, _dpi: Dpi) -> Result<PageFeed, ExtractError> {
        let (tx, rx) = mpsc::channel(1);
        let (exit_tx, exit_rx) = oneshot::channel();
        self.exits.lock().unwrap().push(exit_rx);

        let total = self.total_pages;
        let prepared = self.prepared.clone();
        let worker = tokio::task::spawn_blocking(move || {
            let sent = send_pages(total, &tx, |index| {
                prepared.fetch_add(1, Ordering::SeqCst);
                Ok(page(index, &[&format!("p{}", index + 1)]))
            });
            let _ = exit_tx.send(sent);
        });
        Ok(PageFeed::with_worker(total, rx, worker))
    }
}

// ── Recognizer ───────────────────────────────────────────────────────────────

/// One call as seen by [`ScriptedRecognizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub page_num: usize,
    pub tokens: Vec<String>,
    pub image_size: (u32, u32),
}

type Script = dyn Fn(&RecognitionRequest) -> Result<PageTables, RecognitionError> + Send + Sync;

/// Answers each page with whatever the script returns and records the call.
pub struct ScriptedRecognizer {
    script: Box<Script>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedRecognizer {
    pub fn new(
        script: impl Fn(&RecognitionRequest) -> Result<PageTables, RecognitionError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// One table per page: `<table id="p{page}"></table>`.
    pub fn one_table_per_page() -> Self {
        Self::new(|req| Ok(tables(&[&table_html(req.page_num)])))
    }

    /// Like [`Self::one_table_per_page`] but fails on `failing_page`.
    pub fn failing_on(failing_page: usize) -> Self {
        Self::new(move |req| {
            if req.page_num == failing_page {
                Err(RecognitionError::Status {
                    status: 503,
                    body: "CUDA out of memory at /srv/models/structure.pt".into(),
                })
            } else {
                Ok(tables(&[&table_html(req.page_num)]))
            }
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pages_called(&self) -> Vec<usize> {
        self.calls().iter().map(|c| c.page_num).collect()
    }
}

#[async_trait]
impl TableRecognizer for ScriptedRecognizer {
    async fn recognize(&self, request: RecognitionRequest) -> Result<PageTables, RecognitionError> {
        self.calls.lock().unwrap().push(Call {
            page_num: request.page_num,
            tokens: request.tokens.iter().map(|t| t.text.clone()).collect(),
            image_size: (request.image.width(), request.image.height()),
        });
        (self.script)(&request)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn table_html(page_num: usize) -> String {
    format!("<table id=\"p{page_num}\"></table>")
}

pub fn tables(html: &[&str]) -> PageTables {
    PageTables {
        html: html.iter().map(|s| s.to_string()).collect(),
        ..PageTables::default()
    }
}

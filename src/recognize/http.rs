//! Recognizer backed by a model-serving process reachable over HTTP.
//!
//! The detection and structure models are GPU-resident and live in their own
//! process. Each page is sent as one JSON document: the PNG-encoded page image
//! plus the word tokens and the requested output flags. The response body is
//! a [`PageTables`] JSON object.
//!
//! ```text
//! POST <endpoint>
//! {
//!   "page": 1,
//!   "image": {"mime_type": "image/png", "width": 850, "height": 1100, "data": "<base64>"},
//!   "tokens": [{"bbox": [x0, y0, x1, y1], "text": "...", "flags": 0,
//!               "block_num": 0, "line_num": 0, "span_num": 0}, ...],
//!   "out_objects": true, "out_cells": true, "out_html": true, "out_csv": true
//! }
//! ```

use super::{PageTables, RecognitionError, RecognitionOutputs, RecognitionRequest, TableRecognizer};
use crate::error::ExtractError;
use crate::pipeline::encode::{encode_page, EncodedImage};
use crate::pipeline::tokens::Token;
use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Maximum number of response-body bytes kept in a [`RecognitionError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Settings for [`HttpRecognizer`].
#[derive(Debug, Clone)]
pub struct HttpRecognizerConfig {
    /// Full URL of the recognition endpoint.
    pub endpoint: String,
    /// Per-page request timeout. Default: 120 s (structure recognition on CPU
    /// can take tens of seconds for dense pages).
    pub timeout_secs: u64,
    /// Optional bearer token sent in the `Authorization` header.
    pub auth_token: Option<String>,
}

impl HttpRecognizerConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_secs: 120,
            auth_token: None,
        }
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    page: usize,
    image: EncodedImage,
    tokens: &'a [Token],
    #[serde(flatten)]
    outputs: RecognitionOutputs,
}

/// [`TableRecognizer`] that POSTs each page to a recognition service.
pub struct HttpRecognizer {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    auth_token: Option<String>,
}

impl HttpRecognizer {
    pub fn new(config: HttpRecognizerConfig) -> Result<Self, ExtractError> {
        let endpoint = reqwest::Url::parse(&config.endpoint).map_err(|e| {
            ExtractError::InvalidConfig(format!(
                "recognizer endpoint '{}' is not a valid URL: {e}",
                config.endpoint
            ))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ExtractError::InvalidConfig(format!(
                "recognizer endpoint must be http(s), got '{}'",
                endpoint.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            auth_token: config.auth_token,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

#[async_trait]
impl TableRecognizer for HttpRecognizer {
    async fn recognize(&self, request: RecognitionRequest) -> Result<PageTables, RecognitionError> {
        let RecognitionRequest {
            page_num,
            image,
            tokens,
            outputs,
        } = request;

        // PNG compression of a full page is CPU-bound.
        let image = tokio::task::spawn_blocking(move || encode_page(&image))
            .await
            .map_err(|e| RecognitionError::Rejected(format!("encoder task panicked: {e}")))?
            .map_err(|e| RecognitionError::Rejected(format!("PNG encoding failed: {e}")))?;

        let body = WireRequest {
            page: page_num,
            image,
            tokens: &tokens,
            outputs,
        };

        let start = Instant::now();
        let mut builder = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(ref token) = self.auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut text = response.text().await.unwrap_or_default();
            if text.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
            return Err(RecognitionError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let tables: PageTables = response
            .json()
            .await
            .map_err(|e| RecognitionError::Malformed(e.to_string()))?;

        debug!(
            "Page {}: recognizer returned {} tables in {:?}",
            page_num,
            tables.html.len(),
            start.elapsed()
        );

        Ok(tables)
    }

    fn name(&self) -> &str {
        "http"
    }
}

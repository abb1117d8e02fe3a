//! HTTP upload gateway.
//!
//! | Route          | Description |
//! |----------------|-------------|
//! | `GET /`        | liveness probe, fixed greeting |
//! | `POST /upload` | multipart upload of one PDF; returns `{"html": ...}` |
//!
//! Failures are answered with `{"message": ..., "kind": ...}` built from
//! [`ExtractError::public_message`]; the underlying cause is only logged.
//! With [`ServerConfig::legacy_status`] every outcome is sent as `200 OK`, for
//! older clients that only inspect the body.

use crate::error::{ErrorKind, ExtractError, PageError};
use crate::extract::{is_pdf, TableExtractor};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Settings for the HTTP gateway.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on. Default: `127.0.0.1:8000`.
    pub bind: SocketAddr,
    /// Largest accepted request body. Default: 64 MiB.
    pub max_upload_bytes: usize,
    /// Answer every outcome with `200 OK`. Default: false.
    pub legacy_status: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            max_upload_bytes: 64 * 1024 * 1024,
            legacy_status: false,
        }
    }
}

#[derive(Clone)]
struct AppState {
    extractor: Arc<TableExtractor>,
    legacy_status: bool,
}

#[derive(Debug, Serialize)]
struct HtmlResponse {
    html: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed_pages: Vec<FailedPage>,
}

/// Public view of a [`PageError`] skipped under best-effort policy.
#[derive(Debug, Serialize)]
struct FailedPage {
    page: usize,
    kind: ErrorKind,
    message: String,
}

impl From<&PageError> for FailedPage {
    fn from(err: &PageError) -> Self {
        Self {
            page: err.page(),
            kind: err.kind(),
            message: err.public_message(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
}

impl MessageResponse {
    fn plain(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
        }
    }
}

/// Build the router with all endpoints.
pub fn build_router(extractor: Arc<TableExtractor>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState {
            extractor,
            legacy_status: config.legacy_status,
        })
}

/// Bind `config.bind` and serve until Ctrl-C.
pub async fn serve(extractor: Arc<TableExtractor>, config: ServerConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, build_router(extractor, &config))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Ctrl-C handler failed: {e}");
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
        })
        .await
}

async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::plain("Hello World"))
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let upload = match read_upload(&mut multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(MessageResponse::plain("No file was uploaded")),
            )
                .into_response();
        }
        Err(e) => {
            warn!("Malformed multipart upload: {e}");
            return (
                e.status(),
                Json(MessageResponse::plain("The upload could not be read")),
            )
                .into_response();
        }
    };

    let (file_name, bytes) = match upload {
        Upload::Rejected { file_name } => {
            let err = ExtractError::UnsupportedType { file_name };
            return error_response(&err, state.legacy_status);
        }
        Upload::Pdf { file_name, bytes } => (file_name, bytes),
    };

    match state.extractor.extract(&file_name, bytes).await {
        Ok(result) => {
            for err in result.failed_pages() {
                warn!("Upload '{}': {}", file_name, err);
            }
            let failed_pages: Vec<FailedPage> = result.failed_pages().map(Into::into).collect();
            (
                StatusCode::OK,
                Json(HtmlResponse {
                    html: result.html,
                    failed_pages,
                }),
            )
                .into_response()
        }
        Err(err) => {
            if err.kind() != ErrorKind::UnsupportedType {
                error!("Upload '{}' failed ({:?}): {}", file_name, err.kind(), err);
            }
            error_response(&err, state.legacy_status)
        }
    }
}

enum Upload {
    Pdf { file_name: String, bytes: Bytes },
    Rejected { file_name: String },
}

/// Take the first file field (named `file`, or any field carrying a filename).
///
/// The body of a non-PDF field is never buffered.
async fn read_upload(multipart: &mut Multipart) -> Result<Option<Upload>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        if !is_pdf(&file_name) {
            info!("Rejecting upload '{}': not a PDF", file_name);
            return Ok(Some(Upload::Rejected { file_name }));
        }
        let bytes = field.bytes().await?;
        return Ok(Some(Upload::Pdf { file_name, bytes }));
    }
    Ok(None)
}

fn error_response(err: &ExtractError, legacy_status: bool) -> Response {
    let kind = err.kind();
    let (status, body) = match kind {
        ErrorKind::UnsupportedType => (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            MessageResponse::plain(err.public_message()),
        ),
        _ => {
            let status = match kind {
                ErrorKind::ParseFailure => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::RecognitionFailure => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                MessageResponse {
                    message: format!("An error occurred: {}", err.public_message()),
                    kind: Some(kind),
                },
            )
        }
    };

    let status = if legacy_status { StatusCode::OK } else { status };
    (status, Json(body)).into_response()
}

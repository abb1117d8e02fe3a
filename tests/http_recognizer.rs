//! `HttpRecognizer` against a stub recognition service.

mod common;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use base64::Engine;
use common::token;
use image::DynamicImage;
use pdf_tables::{
    HttpRecognizer, HttpRecognizerConfig, RecognitionError, RecognitionOutputs,
    RecognitionRequest, TableRecognizer,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Captured {
    body: Arc<Mutex<Option<Value>>>,
    auth: Arc<Mutex<Option<String>>>,
}

/// Start a stub that records the request and answers with `status` + `reply`.
async fn spawn_stub(status: StatusCode, reply: &'static str) -> (String, Captured) {
    let captured = Captured::default();
    let app = Router::new()
        .route(
            "/recognize",
            post(
                move |State(captured): State<Captured>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    *captured.body.lock().unwrap() = Some(body);
                    *captured.auth.lock().unwrap() = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    (
                        status,
                        [("content-type", "application/json")],
                        reply,
                    )
                },
            ),
        )
        .with_state(captured.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/recognize"), captured)
}

fn request() -> RecognitionRequest {
    RecognitionRequest {
        page_num: 3,
        image: DynamicImage::new_rgb8(85, 110),
        tokens: vec![token("Revenue", 10), token("2024", 60)],
        outputs: RecognitionOutputs::default(),
    }
}

#[tokio::test]
async fn test_sends_image_tokens_and_flags() {
    let (url, captured) = spawn_stub(
        StatusCode::OK,
        r#"{"objects": [{"label": "table", "score": 0.98, "bbox": [1, 2, 80, 60]}],
            "html": ["<table><tr><td>Revenue</td></tr></table>"],
            "csv": ["Revenue\n"]}"#,
    )
    .await;
    let recognizer = HttpRecognizer::new(HttpRecognizerConfig::new(url)).unwrap();

    let tables = recognizer.recognize(request()).await.unwrap();

    assert_eq!(tables.html, vec!["<table><tr><td>Revenue</td></tr></table>"]);
    assert_eq!(tables.objects[0].label, "table");
    assert!(tables.cells.is_empty());

    let body = captured.body.lock().unwrap().clone().unwrap();
    assert_eq!(body["page"], 3);
    assert_eq!(body["out_objects"], true);
    assert_eq!(body["out_cells"], true);
    assert_eq!(body["out_html"], true);
    assert_eq!(body["out_csv"], true);
    assert_eq!(
        body["tokens"][0],
        json!({"bbox": [10, 10, 50, 22], "text": "Revenue", "flags": 0,
               "block_num": 0, "line_num": 0, "span_num": 0})
    );
    assert_eq!(body["image"]["mime_type"], "image/png");
    assert_eq!(body["image"]["width"], 85);
    assert_eq!(body["image"]["height"], 110);

    let png = base64::engine::general_purpose::STANDARD
        .decode(body["image"]["data"].as_str().unwrap())
        .unwrap();
    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (85, 110));

    assert!(captured.auth.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_sends_bearer_token() {
    let (url, captured) = spawn_stub(StatusCode::OK, r#"{"html": []}"#).await;
    let recognizer = HttpRecognizer::new(HttpRecognizerConfig {
        auth_token: Some("s3cret".into()),
        ..HttpRecognizerConfig::new(url)
    })
    .unwrap();

    recognizer.recognize(request()).await.unwrap();

    assert_eq!(
        captured.auth.lock().unwrap().as_deref(),
        Some("Bearer s3cret")
    );
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let (url, _) = spawn_stub(
        StatusCode::SERVICE_UNAVAILABLE,
        r#"{"detail": "model still loading"}"#,
    )
    .await;
    let recognizer = HttpRecognizer::new(HttpRecognizerConfig::new(url)).unwrap();

    let err = recognizer.recognize(request()).await.unwrap_err();

    match err {
        RecognitionError::Status { status, body } => {
            assert_eq!(status, 503);
            assert!(body.contains("model still loading"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_reported() {
    let (url, _) = spawn_stub(StatusCode::OK, r#"{"html": "not a list"}"#).await;
    let recognizer = HttpRecognizer::new(HttpRecognizerConfig::new(url)).unwrap();

    let err = recognizer.recognize(request()).await.unwrap_err();

    assert!(matches!(err, RecognitionError::Malformed(_)), "got {err:?}");
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let recognizer =
        HttpRecognizer::new(HttpRecognizerConfig::new(format!("http://{addr}/recognize")))
            .unwrap();

    let err = recognizer.recognize(request()).await.unwrap_err();

    assert!(matches!(err, RecognitionError::Transport(_)), "got {err:?}");
}

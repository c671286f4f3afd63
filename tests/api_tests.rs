//! End-to-end tests of the HTTP contract, driving the real router with an
//! in-memory database, a temp-dir blob store, and a scripted engine.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

use vscribe::api::{self, AppState};
use vscribe::db;
use vscribe::engine::{EngineError, EngineTranscript, TranscriptionEngine};
use vscribe::export::ExportCache;
use vscribe::job::{Pipeline, PipelineSettings};
use vscribe::storage::BlobStore;

const BOUNDARY: &str = "x-vscribe-test-boundary";

struct FixedEngine {
    result: Result<String, String>,
}

impl FixedEngine {
    fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(text.to_string()),
        })
    }

    fn failing(detail: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(detail.to_string()),
        })
    }
}

#[async_trait]
impl TranscriptionEngine for FixedEngine {
    async fn transcribe(
        &self,
        _wav: Vec<u8>,
        _language: Option<&str>,
    ) -> Result<EngineTranscript, EngineError> {
        match &self.result {
            Ok(text) => Ok(EngineTranscript {
                text: text.clone(),
                detected_language: Some("en".to_string()),
            }),
            Err(detail) => Err(EngineError::Rejected(detail.clone())),
        }
    }
}

async fn test_app(engine: Arc<dyn TranscriptionEngine>) -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = BlobStore::new(dir.path().join("blobs")).unwrap();
    let pool = db::init_db("sqlite::memory:").await.unwrap();

    let pipeline = Pipeline::new(
        store,
        engine,
        pool,
        PipelineSettings {
            work_dir: dir.path().join("work"),
            max_processing: Duration::from_secs(10),
            retry_base_delay: Duration::from_millis(5),
            ..Default::default()
        },
    )
    .unwrap();

    let state = AppState {
        pipeline,
        exports: Arc::new(ExportCache::new()),
    };
    (api::router(state), dir)
}

fn wav_fixture() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..8_000 {
            writer.write_sample((i % 100) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn multipart_upload(filename: &str, bytes: &[u8], language: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");

    if let Some(language) = language {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"language\"\r\n\r\n");
        body.extend_from_slice(language.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/transcribe/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn upload_and_wait(app: &Router, language: Option<&str>) -> String {
    let response = app
        .clone()
        .oneshot(multipart_upload("clip.wav", &wav_fixture(), language))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], Value::Bool(true));
    json["file_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn transcribe_returns_final_text() {
    let (app, _dir) = test_app(FixedEngine::ok("hello from the fixture")).await;

    let response = app
        .clone()
        .oneshot(multipart_upload("clip.wav", &wav_fixture(), Some("en")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], Value::Bool(true));
    assert_eq!(json["transcription"], "hello from the fixture");
    assert!(json["file_id"].as_str().unwrap().len() > 10);
}

#[tokio::test]
async fn status_reports_ready_job() {
    let (app, _dir) = test_app(FixedEngine::ok("status check")).await;
    let id = upload_and_wait(&app, None).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/status/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["state"], "ready");
    assert_eq!(json["progress_percent"], 100);
}

#[tokio::test]
async fn download_returns_plain_text() {
    let (app, _dir) = test_app(FixedEngine::ok("the spoken words")).await;
    let id = upload_and_wait(&app, None).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/download/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    assert_eq!(body_bytes(response).await, b"the spoken words");
}

#[tokio::test]
async fn txt_export_is_byte_identical_to_transcript() {
    let (app, _dir) = test_app(FixedEngine::ok("identical bytes expected")).await;
    let id = upload_and_wait(&app, None).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/export/{id}?format=txt"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"identical bytes expected");
}

#[tokio::test]
async fn export_formats_carry_their_content_types() {
    let (app, _dir) = test_app(FixedEngine::ok("typed exports")).await;
    let id = upload_and_wait(&app, None).await;

    for (query, content_type, magic) in [
        ("?format=docx", "wordprocessingml", b"PK".as_slice()),
        ("?format=html", "text/html", b"<!DOCTYPE html>".as_slice()),
        ("", "application/pdf", b"%PDF-".as_slice()),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/export/{id}{query}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "query {query:?}");
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .contains(content_type)
        );
        let bytes = body_bytes(response).await;
        assert_eq!(&bytes[..magic.len()], magic, "query {query:?}");
    }
}

#[tokio::test]
async fn save_then_export_reflects_the_edit() {
    let (app, _dir) = test_app(FixedEngine::ok("original transcript")).await;
    let id = upload_and_wait(&app, None).await;

    // Prime the export cache with the original text first.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/export/{id}?format=txt"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_bytes(response).await, b"original transcript");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/save/{id}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"text":"edited"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], Value::Bool(true));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/export/{id}?format=txt"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_bytes(response).await, b"edited");
}

#[tokio::test]
async fn unknown_job_is_404_on_every_endpoint() {
    let (app, _dir) = test_app(FixedEngine::ok("unused")).await;

    for request in [
        Request::builder()
            .uri("/download/no-such-id")
            .body(Body::empty())
            .unwrap(),
        Request::builder()
            .uri("/export/no-such-id?format=txt")
            .body(Body::empty())
            .unwrap(),
        Request::builder()
            .uri("/status/no-such-id")
            .body(Body::empty())
            .unwrap(),
        Request::builder()
            .method("POST")
            .uri("/save/no-such-id")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"text":"anything"}"#))
            .unwrap(),
    ] {
        let uri = request.uri().clone();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri {uri}");
        let json = body_json(response).await;
        assert!(json["detail"].is_string(), "uri {uri}");
    }
}

#[tokio::test]
async fn unknown_export_format_is_400() {
    let (app, _dir) = test_app(FixedEngine::ok("format check")).await;
    let id = upload_and_wait(&app, None).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/export/{id}?format=xlsx"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("xlsx"));
}

#[tokio::test]
async fn upload_validation_rejects_bad_requests() {
    let (app, _dir) = test_app(FixedEngine::ok("unused")).await;

    // Extension not on the allow-list.
    let response = app
        .clone()
        .oneshot(multipart_upload("notes.txt", b"some plain text body", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Whitelisted extension but the bytes are not that container.
    let response = app
        .clone()
        .oneshot(multipart_upload("fake.wav", b"definitely not riff data", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // No file part at all.
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"language\"\r\n\r\nen\r\n");
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/transcribe/")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn save_with_empty_text_is_400() {
    let (app, _dir) = test_app(FixedEngine::ok("keep me")).await;
    let id = upload_and_wait(&app, None).await;

    for payload in [r#"{"text":""}"#, r#"{}"#] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/save/{id}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "payload {payload}");
    }

    // The transcript is untouched.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/download/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_bytes(response).await, b"keep me");
}

#[tokio::test]
async fn engine_rejection_surfaces_as_processing_error() {
    let (app, _dir) = test_app(FixedEngine::failing("audio is silence")).await;

    let response = app
        .clone()
        .oneshot(multipart_upload("clip.wav", &wav_fixture(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("audio is silence"));
}

#[tokio::test]
async fn responses_carry_cors_headers() {
    let (app, _dir) = test_app(FixedEngine::ok("cors")).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/status/whatever")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/transcribe/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

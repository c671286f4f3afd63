//! HTTP surface: the four endpoints the front end calls, plus job status
//! polling for the progress bar.

use axum::Json;
use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::error::AppError;
use crate::export::{self, ExportCache, ExportFormat};
use crate::job::{JobSnapshot, JobState, Pipeline};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub exports: Arc<ExportCache>,
}

pub fn router(state: AppState) -> Router {
    let upload_limit = state.pipeline.settings().max_file_size as usize;

    Router::new()
        .route("/transcribe/", post(transcribe))
        .route("/status/{id}", get(status))
        .route("/download/{id}", get(download))
        .route("/export/{id}", get(export_transcription))
        .route("/save/{id}", post(save))
        // multipart uploads can exceed axum's default 2 MB body cap
        .layer(DefaultBodyLimit::max(upload_limit + 64 * 1024))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub success: bool,
    pub file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/// Upload a media file and block (bounded) for its transcript.
///
/// Internally this is submit-then-poll; if processing outruns the request
/// deadline the client gets the job id back and continues via `/status`.
async fn transcribe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut language: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::Validation("file part has no filename".into()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read upload: {e}")))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("language") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read language: {e}")))?;
                if !value.trim().is_empty() {
                    language = Some(value.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| AppError::Validation("missing file part".to_string()))?;

    let id = state.pipeline.submit(bytes, &filename, language).await?;
    let deadline = state.pipeline.settings().max_processing;
    let snapshot = state.pipeline.wait_for_terminal(&id, deadline).await?;

    match snapshot.state {
        JobState::Ready => {
            let transcription = state.pipeline.transcript(&id).await?;
            Ok(Json(TranscriptionResponse {
                success: true,
                file_id: id,
                transcription: Some(transcription),
                message: "Transcription completed successfully".to_string(),
            }))
        }
        JobState::Failed => Err(AppError::Processing(
            snapshot
                .error_detail
                .unwrap_or_else(|| "unknown failure".to_string()),
        )),
        _ => {
            info!("Job {} still running at request deadline", id);
            Ok(Json(TranscriptionResponse {
                success: false,
                file_id: id.clone(),
                transcription: None,
                message: format!("Transcription still in progress; poll /status/{id}"),
            }))
        }
    }
}

async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobSnapshot>, AppError> {
    Ok(Json(state.pipeline.status(&id).await?))
}

async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let text = state.pipeline.transcript(&id).await?;
    Ok(file_response(
        text.into_bytes(),
        "text/plain; charset=utf-8",
        format!("transcription_{id}.txt"),
    ))
}

async fn export_transcription(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let token = query.format.unwrap_or_else(|| "pdf".to_string());
    let Some(format) = ExportFormat::from_str(&token) else {
        return Err(AppError::UnsupportedFormat(token));
    };

    let (text, version) = state.pipeline.transcript_with_version(&id).await?;
    let bytes = match state.exports.get(&id, format, version) {
        Some(cached) => cached,
        None => {
            let rendered = export::render(export::DOCUMENT_TITLE, &text, format)?;
            state.exports.insert(&id, format, version, rendered.clone());
            rendered
        }
    };

    Ok(file_response(
        bytes,
        format.content_type(),
        format!("transcription_{id}.{}", format.extension()),
    ))
}

async fn save(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SaveRequest>,
) -> Result<Json<SaveResponse>, AppError> {
    let text = request
        .text
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("No text provided".to_string()))?;

    state.pipeline.save_transcript(&id, text).await?;
    state.exports.invalidate(&id);

    Ok(Json(SaveResponse {
        success: true,
        message: "Transcription saved.".to_string(),
    }))
}

fn file_response(bytes: Vec<u8>, content_type: &'static str, filename: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// Permissive CORS for the browser client; preflights are answered here
/// rather than routed.
async fn cors(request: Request, next: Next) -> Response {
    let preflight = request.method() == Method::OPTIONS;
    let mut response = if preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    response
}

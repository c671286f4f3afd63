//! OpenAI-compatible Whisper transcription backend.
//!
//! Speaks the `/audio/transcriptions` multipart contract: a WAV file part,
//! a model name, and an optional language hint.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{EngineError, EngineTranscript, TranscriptionEngine};

#[derive(Debug, Clone)]
pub struct WhisperApiConfig {
    /// API base, e.g. `https://api.openai.com/v1`.
    pub api_url: String,
    pub api_key: String,
    /// Model name, e.g. `whisper-1`.
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

pub struct WhisperApiEngine {
    config: WhisperApiConfig,
    client: reqwest::Client,
}

impl WhisperApiEngine {
    pub fn new(config: WhisperApiConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::Unavailable(format!("http client: {e}")))?;

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/audio/transcriptions",
            self.config.api_url.trim_end_matches('/')
        )
    }
}

/// Engine-side throttling and server faults are retryable; anything else the
/// server said no to is permanent.
fn classify_status(status: StatusCode, body: String) -> EngineError {
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        EngineError::Unavailable(format!("{status}: {body}"))
    } else {
        EngineError::Rejected(format!("{status}: {body}"))
    }
}

#[async_trait]
impl TranscriptionEngine for WhisperApiEngine {
    async fn transcribe(
        &self,
        wav: Vec<u8>,
        language: Option<&str>,
    ) -> Result<EngineTranscript, EngineError> {
        let wav_len = wav.len();
        let part = multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| EngineError::Rejected(format!("invalid part: {e}")))?;

        let mut form = multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model.clone());
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        debug!("Sending {} WAV bytes to {}", wav_len, self.endpoint());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout(self.config.timeout.as_secs())
                } else {
                    EngineError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: WhisperResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Rejected(format!("unparseable response: {e}")))?;

        Ok(EngineTranscript {
            text: parsed.text,
            detected_language: parsed.language,
        })
    }
}

//! Speech-to-text engine abstraction.
//!
//! The pipeline only ever sees this trait; the concrete engine is an external
//! capability (an HTTP API in production, a scripted fake in tests).

pub mod whisper_api;

use async_trait::async_trait;
use thiserror::Error;

pub use whisper_api::{WhisperApiConfig, WhisperApiEngine};

/// Output of one engine call.
#[derive(Debug, Clone)]
pub struct EngineTranscript {
    pub text: String,
    /// Language the engine detected, when it reports one.
    pub detected_language: Option<String>,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Transcription engine unavailable: {0}")]
    Unavailable(String),
    #[error("Transcription engine timed out after {0}s")]
    Timeout(u64),
    #[error("Transcription rejected: {0}")]
    Rejected(String),
}

impl EngineError {
    /// Transient failures are worth a bounded retry; rejections are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Unavailable(_) | EngineError::Timeout(_))
    }
}

#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    /// Transcribe one normalized WAV payload.
    ///
    /// `language` is a hint; `None` asks the engine to auto-detect.
    async fn transcribe(
        &self,
        wav: Vec<u8>,
        language: Option<&str>,
    ) -> Result<EngineTranscript, EngineError>;
}

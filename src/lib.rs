//! vscribe - media transcription service with multi-format export.
//!
//! Accepts audio/video uploads over HTTP, extracts and windows the audio,
//! transcribes it through an external speech-to-text engine, and serves the
//! transcript as TXT, DOCX, PDF, or HTML.
//!
//! ```text
//! [Upload] -> [API] -> [Pipeline] -> [Extract (ffmpeg)] -> [Engine windows]
//!                          |                                     |
//!                     [Job registry] <------ transcript ---------+
//!                          |
//!              [/download /export /save /status]
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod export;
pub mod job;
pub mod media;
pub mod storage;

pub use config::Config;
pub use error::AppError;
pub use job::{Job, JobSnapshot, JobState, Pipeline, PipelineSettings};
pub use storage::{BlobRef, BlobStore};

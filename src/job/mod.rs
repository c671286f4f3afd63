//! Transcription job records and the in-process registry.
//!
//! One `Job` tracks a single upload from receipt to a terminal state. The
//! registry shards jobs across a concurrent map and hands out one lock per
//! job, so a `save` and an `export` on the same id serialize against each
//! other without a global lock.

pub mod pipeline;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::storage::BlobRef;

pub use pipeline::{Pipeline, PipelineSettings};

/// Job lifecycle states. Transitions are strictly sequential:
/// `Received -> Extracting -> Transcribing -> Ready | Failed`, with any
/// non-terminal state allowed to fall into `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Received,
    Extracting,
    Transcribing,
    Ready,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Ready | JobState::Failed)
    }
}

/// One transcription request's lifecycle record.
#[derive(Debug)]
pub struct Job {
    pub id: String,
    pub filename: String,
    pub language_hint: Option<String>,
    pub state: JobState,
    /// 0-100, never decreases, hits 100 only in a terminal state.
    pub progress_percent: u8,
    /// Stored original upload; cleared once the job is terminal.
    pub source_media: Option<BlobRef>,
    /// Present if and only if the job is `Ready`.
    pub transcript_text: Option<String>,
    /// Stored transcript blob; swapped (not rewritten) on save.
    pub transcript_blob: Option<BlobRef>,
    /// Bumped on every transcript write; export cache key component.
    pub transcript_version: u64,
    /// Present only in `Failed`.
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(filename: String, language_hint: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            filename,
            language_hint,
            state: JobState::Received,
            progress_percent: 0,
            source_media: None,
            transcript_text: None,
            transcript_blob: None,
            transcript_version: 0,
            error_detail: None,
            created_at: Utc::now(),
        }
    }

    /// Advance to the next non-terminal state at the given milestone.
    /// Ignored once the job is terminal.
    pub fn advance(&mut self, state: JobState, progress: u8) {
        if self.state.is_terminal() {
            return;
        }
        self.state = state;
        self.set_progress(progress);
    }

    /// Monotonic progress update, capped below 100 until a terminal state.
    pub fn set_progress(&mut self, percent: u8) {
        let ceiling = if self.state.is_terminal() { 100 } else { 99 };
        let percent = percent.min(ceiling);
        if percent > self.progress_percent {
            self.progress_percent = percent;
        }
    }

    /// Terminal success: transcript becomes available, progress pins to 100.
    pub fn complete(&mut self, text: String, blob: BlobRef) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Ready;
        self.transcript_text = Some(text);
        self.transcript_blob = Some(blob);
        self.transcript_version = 1;
        self.progress_percent = 100;
    }

    /// Terminal failure: capture the reason, progress pins to 100.
    pub fn fail(&mut self, detail: String) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Failed;
        self.error_detail = Some(detail);
        self.progress_percent = 100;
    }
}

/// Point-in-time view of a job, safe to hand to the API layer.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub file_id: String,
    pub state: JobState,
    pub progress_percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl JobSnapshot {
    fn of(job: &Job) -> Self {
        Self {
            file_id: job.id.clone(),
            state: job.state,
            progress_percent: job.progress_percent,
            error_detail: job.error_detail.clone(),
            created_at: job.created_at,
        }
    }
}

/// Shared job registry: O(1) lookup by id, one `RwLock` per job.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<String, Arc<RwLock<Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) -> Arc<RwLock<Job>> {
        let id = job.id.clone();
        let entry = Arc::new(RwLock::new(job));
        self.jobs.insert(id, entry.clone());
        entry
    }

    pub fn get(&self, id: &str) -> Option<Arc<RwLock<Job>>> {
        self.jobs.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub async fn snapshot(&self, id: &str) -> Option<JobSnapshot> {
        let entry = self.get(id)?;
        let job = entry.read().await;
        Some(JobSnapshot::of(&job))
    }
}

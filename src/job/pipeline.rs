//! The transcription pipeline.
//!
//! `submit` validates an upload, persists it, and hands the rest to a
//! background worker: extract audio, window it, run the engine per window
//! with bounded retries, publish the transcript. Workers never unwind into
//! the API task; every failure lands in the job's `error_detail`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::db::{self, DbPool};
use crate::engine::{EngineError, EngineTranscript, TranscriptionEngine};
use crate::error::AppError;
use crate::job::{Job, JobRegistry, JobSnapshot, JobState};
use crate::media::{self, MediaError, MediaKind};
use crate::storage::BlobStore;

/// How often the blocking endpoint re-reads job state.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Scratch space for ffmpeg inputs/outputs.
    pub work_dir: PathBuf,
    pub max_file_size: u64,
    /// Upper bound the blocking transcribe endpoint will wait.
    pub max_processing: Duration,
    pub extract_timeout: Duration,
    pub chunk_secs: u64,
    pub chunk_overlap_secs: u64,
    pub max_concurrent_jobs: usize,
    /// Total engine attempts per window (first try included).
    pub engine_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("data/work"),
            max_file_size: 5_000 * 1024 * 1024,
            max_processing: Duration::from_secs(900),
            extract_timeout: Duration::from_secs(300),
            chunk_secs: 120,
            chunk_overlap_secs: 2,
            max_concurrent_jobs: 4,
            engine_attempts: 3,
            retry_base_delay: Duration::from_secs(2),
        }
    }
}

pub struct Pipeline {
    registry: JobRegistry,
    store: BlobStore,
    engine: Arc<dyn TranscriptionEngine>,
    db: DbPool,
    settings: PipelineSettings,
    slots: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(
        store: BlobStore,
        engine: Arc<dyn TranscriptionEngine>,
        db: DbPool,
        settings: PipelineSettings,
    ) -> Result<Arc<Self>, AppError> {
        std::fs::create_dir_all(&settings.work_dir)?;
        let slots = Arc::new(Semaphore::new(settings.max_concurrent_jobs));

        Ok(Arc::new(Self {
            registry: JobRegistry::new(),
            store,
            engine,
            db,
            settings,
            slots,
        }))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Validate and accept an upload. Returns the job id immediately; the
    /// pipeline itself continues on a spawned worker.
    pub async fn submit(
        self: &Arc<Self>,
        bytes: Vec<u8>,
        filename: &str,
        language_hint: Option<String>,
    ) -> Result<String, AppError> {
        if bytes.len() as u64 > self.settings.max_file_size {
            return Err(MediaError::TooLarge {
                size: bytes.len() as u64,
                limit: self.settings.max_file_size,
            }
            .into());
        }
        let kind = media::detect(filename, &bytes)?;

        let mut job = Job::new(filename.to_string(), language_hint);
        let id = job.id.clone();
        job.source_media = Some(self.store.put(&bytes).await?);
        self.registry.insert(job);

        info!("Job {} received: {} ({} bytes)", id, filename, bytes.len());

        let pipeline = Arc::clone(self);
        let job_id = id.clone();
        tokio::spawn(async move {
            pipeline.run(job_id, kind).await;
        });

        Ok(id)
    }

    async fn run(self: Arc<Self>, id: String, kind: MediaKind) {
        let _permit = match self.slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.fail_job(&id, "worker pool shut down".to_string()).await;
                return;
            }
        };

        match self.process(&id, kind).await {
            Ok(transcript) => self.publish(&id, transcript).await,
            Err(e) => self.fail_job(&id, e.to_string()).await,
        }

        self.cleanup_source(&id).await;
    }

    async fn process(&self, id: &str, kind: MediaKind) -> Result<String, AppError> {
        let (source, language) = {
            let entry = self
                .registry
                .get(id)
                .ok_or_else(|| AppError::NotFound(id.to_string()))?;
            let job = entry.read().await;
            let source = job
                .source_media
                .clone()
                .ok_or_else(|| AppError::Processing("source media missing".to_string()))?;
            (source, job.language_hint.clone())
        };

        self.advance(id, JobState::Extracting, 10).await;
        let media_bytes = self.store.get(&source).await?;

        let work_path = self
            .settings
            .work_dir
            .join(format!("{id}.{}", kind.extension()));
        tokio::fs::write(&work_path, &media_bytes).await?;
        let extracted = media::to_pcm_wav(&work_path, kind, self.settings.extract_timeout).await;
        let _ = tokio::fs::remove_file(&work_path).await;
        let wav = extracted?;

        self.advance(id, JobState::Transcribing, 40).await;
        let chunks = media::split_wav(
            &wav,
            self.settings.chunk_secs,
            self.settings.chunk_overlap_secs,
        )?;
        let total = chunks.len();
        info!("Job {}: transcribing {} window(s)", id, total);

        let mut parts = Vec::with_capacity(total);
        for chunk in chunks {
            let result = self
                .transcribe_with_retry(chunk.bytes, language.as_deref())
                .await?;
            if let Some(lang) = &result.detected_language {
                debug!("Job {}: window {} detected language {}", id, chunk.index, lang);
            }

            let trimmed = result.text.trim().to_string();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
            let progress = 40 + (((chunk.index + 1) * 55) / total) as u8;
            self.set_progress(id, progress).await;
        }

        Ok(parts.join(" "))
    }

    async fn transcribe_with_retry(
        &self,
        wav: Vec<u8>,
        language: Option<&str>,
    ) -> Result<EngineTranscript, EngineError> {
        let mut delay = self.settings.retry_base_delay;
        let mut attempt = 1u32;
        loop {
            match self.engine.transcribe(wav.clone(), language).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < self.settings.engine_attempts => {
                    warn!(
                        "Engine attempt {}/{} failed ({}), retrying in {:?}",
                        attempt, self.settings.engine_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Persist the transcript blob, flip the job to `Ready`, record the
    /// completion in the database.
    async fn publish(&self, id: &str, transcript: String) {
        let blob = match self.store.put(transcript.as_bytes()).await {
            Ok(blob) => blob,
            Err(e) => {
                self.fail_job(id, format!("failed to persist transcript: {e}"))
                    .await;
                return;
            }
        };

        let Some(entry) = self.registry.get(id) else {
            return;
        };
        let (filename, language) = {
            let mut job = entry.write().await;
            job.complete(transcript, blob);
            (job.filename.clone(), job.language_hint.clone())
        };

        if let Err(e) = db::record_transcription(&self.db, id, &filename, language.as_deref()).await
        {
            warn!("Job {}: transcription record not written: {}", id, e);
        }
        info!("Job {} ready", id);
    }

    async fn fail_job(&self, id: &str, detail: String) {
        error!("Job {} failed: {}", id, detail);
        if let Some(entry) = self.registry.get(id) {
            entry.write().await.fail(detail);
        }
    }

    /// Uploads are only needed during processing; drop them at terminal.
    async fn cleanup_source(&self, id: &str) {
        let blob = match self.registry.get(id) {
            Some(entry) => entry.write().await.source_media.take(),
            None => return,
        };
        if let Some(blob) = blob {
            if let Err(e) = self.store.delete(&blob).await {
                warn!("Job {}: source media not removed: {}", id, e);
            }
        }
    }

    async fn advance(&self, id: &str, state: JobState, progress: u8) {
        if let Some(entry) = self.registry.get(id) {
            entry.write().await.advance(state, progress);
        }
    }

    async fn set_progress(&self, id: &str, percent: u8) {
        if let Some(entry) = self.registry.get(id) {
            entry.write().await.set_progress(percent);
        }
    }

    pub async fn status(&self, id: &str) -> Result<JobSnapshot, AppError> {
        self.registry
            .snapshot(id)
            .await
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    pub async fn transcript(&self, id: &str) -> Result<String, AppError> {
        Ok(self.transcript_with_version(id).await?.0)
    }

    /// Consistent (text, version) snapshot for rendering and cache keying.
    pub async fn transcript_with_version(&self, id: &str) -> Result<(String, u64), AppError> {
        let entry = self
            .registry
            .get(id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        let job = entry.read().await;
        match (&job.transcript_text, job.state) {
            (Some(text), JobState::Ready) => Ok((text.clone(), job.transcript_version)),
            _ => Err(AppError::NotReady(id.to_string())),
        }
    }

    /// Overwrite the transcript (last-write-wins). The blob is swapped, not
    /// rewritten, and the version bump makes cached exports stale.
    pub async fn save_transcript(&self, id: &str, text: String) -> Result<(), AppError> {
        let entry = self
            .registry
            .get(id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;

        let mut job = entry.write().await;
        if job.state != JobState::Ready {
            return Err(AppError::NotReady(id.to_string()));
        }
        let new_blob = self.store.put(text.as_bytes()).await?;
        let old_blob = job.transcript_blob.replace(new_blob);
        job.transcript_text = Some(text);
        job.transcript_version += 1;
        drop(job);

        if let Some(old) = old_blob {
            if let Err(e) = self.store.delete(&old).await {
                warn!("Job {}: stale transcript blob not removed: {}", id, e);
            }
        }
        Ok(())
    }

    /// Poll until the job is terminal or `limit` elapses; returns the last
    /// snapshot either way.
    pub async fn wait_for_terminal(
        &self,
        id: &str,
        limit: Duration,
    ) -> Result<JobSnapshot, AppError> {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let snapshot = self.status(id).await?;
            if snapshot.state.is_terminal() || tokio::time::Instant::now() >= deadline {
                return Ok(snapshot);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

use anyhow::Context as _;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use vscribe::api::{self, AppState};
use vscribe::config::Config;
use vscribe::db;
use vscribe::engine::{WhisperApiConfig, WhisperApiEngine};
use vscribe::export::ExportCache;
use vscribe::job::{Pipeline, PipelineSettings};
use vscribe::storage::BlobStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let db_pool = db::init_db(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    info!("Database initialized successfully");

    let store = BlobStore::new(config.data_dir.join("blobs"))
        .context("Failed to initialize blob store")?;

    let engine = Arc::new(
        WhisperApiEngine::new(WhisperApiConfig {
            api_url: config.engine.api_url.clone(),
            api_key: config.engine.api_key.clone(),
            model: config.engine.model.clone(),
            timeout: config.engine_timeout(),
        })
        .context("Failed to build transcription engine")?,
    );

    let pipeline = Pipeline::new(
        store,
        engine,
        db_pool,
        PipelineSettings {
            work_dir: config.data_dir.join("work"),
            max_file_size: config.limits.max_file_size,
            max_processing: config.max_processing(),
            extract_timeout: config.extract_timeout(),
            chunk_secs: config.engine.chunk_secs,
            chunk_overlap_secs: config.engine.chunk_overlap_secs,
            max_concurrent_jobs: config.limits.max_concurrent_jobs,
            engine_attempts: 3,
            retry_base_delay: Duration::from_secs(2),
        },
    )
    .context("Failed to start pipeline")?;

    let state = AppState {
        pipeline,
        exports: Arc::new(ExportCache::new()),
    };
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

pub type DbPool = SqlitePool;

/// Row recorded for every completed transcription.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TranscriptionRecord {
    pub file_id: String,
    pub filename: String,
    pub language: Option<String>,
    pub created_at: String,
}

pub async fn init_db(database_url: &str) -> Result<DbPool, sqlx::Error> {
    if let Some(path) = database_url.strip_prefix("sqlite:") {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

pub async fn record_transcription(
    pool: &DbPool,
    file_id: &str,
    filename: &str,
    language: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO transcriptions (file_id, filename, language, created_at)
        VALUES (?, ?, ?, datetime('now'))
        ON CONFLICT(file_id)
        DO UPDATE SET filename = excluded.filename, language = excluded.language
        "#,
    )
    .bind(file_id)
    .bind(filename)
    .bind(language)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_transcription(
    pool: &DbPool,
    file_id: &str,
) -> Result<Option<TranscriptionRecord>, sqlx::Error> {
    let record =
        sqlx::query_as::<_, TranscriptionRecord>("SELECT * FROM transcriptions WHERE file_id = ?")
            .bind(file_id)
            .fetch_optional(pool)
            .await?;

    Ok(record)
}

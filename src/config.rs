//! Environment-driven configuration.
//!
//! Everything has a local-development default except the engine API key,
//! which the process refuses to start without.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} must be set")]
    Missing { var: &'static str },
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub database_url: String,
    pub engine: EngineSettings,
    pub limits: Limits,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    pub chunk_secs: u64,
    pub chunk_overlap_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Limits {
    pub max_file_size: u64,
    pub max_processing_secs: u64,
    pub extract_timeout_secs: u64,
    pub max_concurrent_jobs: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing {
                var: "OPENAI_API_KEY",
            })?;

        Ok(Self {
            bind_addr: parse_var("VSCRIBE_BIND_ADDR", "127.0.0.1:8000")?,
            data_dir: PathBuf::from(var_or("VSCRIBE_DATA_DIR", "data")),
            database_url: var_or("DATABASE_URL", "sqlite:data/vscribe.db"),
            engine: EngineSettings {
                api_url: var_or("VSCRIBE_ENGINE_URL", "https://api.openai.com/v1"),
                api_key,
                model: var_or("VSCRIBE_ENGINE_MODEL", "whisper-1"),
                timeout_secs: parse_var("VSCRIBE_ENGINE_TIMEOUT_SECS", "120")?,
                chunk_secs: parse_var("VSCRIBE_CHUNK_SECS", "120")?,
                chunk_overlap_secs: parse_var("VSCRIBE_CHUNK_OVERLAP_SECS", "2")?,
            },
            limits: Limits {
                // 5 GB, matching the upload cap the front end advertises
                max_file_size: parse_var("VSCRIBE_MAX_FILE_SIZE", "5242880000")?,
                max_processing_secs: parse_var("VSCRIBE_MAX_PROCESSING_SECS", "900")?,
                extract_timeout_secs: parse_var("VSCRIBE_EXTRACT_TIMEOUT_SECS", "300")?,
                max_concurrent_jobs: parse_var("VSCRIBE_MAX_CONCURRENT_JOBS", "4")?,
            },
        })
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.timeout_secs)
    }

    pub fn max_processing(&self) -> Duration {
        Duration::from_secs(self.limits.max_processing_secs)
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.limits.extract_timeout_secs)
    }
}

fn var_or(var: &'static str, default: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: &str) -> Result<T, ConfigError> {
    let raw = var_or(var, default);
    raw.parse().map_err(|_| ConfigError::Invalid {
        var,
        value: raw.clone(),
    })
}

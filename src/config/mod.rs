//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! Sensitive values wrapped in secrecy::SecretString to prevent log leaks.

pub mod secrets;

use crate::error::{Error, Result};
use secrecy::SecretString;

/// Which object-storage backend holds generated images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackendKind {
    /// S3-compatible store (AWS S3, MinIO, Supabase storage, ...).
    S3,
    /// Local filesystem directory, for single-host deployments.
    Filesystem,
    /// In-memory store, for tests.
    Memory,
}

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    /// Base URL of the AI generation service, e.g. "http://ai-service:8000".
    pub backend_url: String,
    pub port: u16,
    /// Simultaneous in-flight generation calls. The backend is GPU-bound,
    /// so this stays small.
    pub worker_concurrency: usize,
    /// pgmq visibility timeout for leased messages, in seconds.
    pub visibility_timeout_secs: i32,
    /// Attempts before a message is archived as terminally failed.
    pub max_attempts: i32,
    pub storage_backend: StorageBackendKind,
    /// Bucket name (s3) or ignored for filesystem/memory.
    pub storage_bucket: String,
    /// Custom S3 endpoint, e.g. "http://localhost:9000" for MinIO.
    pub storage_endpoint: Option<String>,
    /// Root directory for the filesystem backend.
    pub storage_path: String,
    /// Public base URL under which stored objects are reachable.
    pub storage_public_url: String,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    /// In production, systemd EnvironmentFile provides the vars.
    pub fn from_env() -> Result<Self> {
        let storage_backend = match std::env::var("STORAGE_BACKEND").as_deref() {
            Ok("s3") => StorageBackendKind::S3,
            Ok("filesystem") | Ok("fs") => StorageBackendKind::Filesystem,
            Ok("memory") | Ok("mem") => StorageBackendKind::Memory,
            Ok(other) => {
                return Err(Error::Config(format!(
                    "unsupported STORAGE_BACKEND={other} (expected s3|filesystem|memory)"
                )));
            }
            Err(_) => StorageBackendKind::Filesystem,
        };

        let storage_bucket =
            std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| "artworks".to_string());
        let storage_public_url = std::env::var("STORAGE_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:9000/{storage_bucket}"));

        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            backend_url: std::env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://ai-service:8000".to_string()),
            port: parse_var("PORT", 3001)?,
            worker_concurrency: parse_var("WORKER_CONCURRENCY", 5)?,
            visibility_timeout_secs: parse_var("VISIBILITY_TIMEOUT_SECS", 60)?,
            max_attempts: parse_var("MAX_ATTEMPTS", 3)?,
            storage_backend,
            storage_bucket,
            storage_endpoint: std::env::var("STORAGE_ENDPOINT").ok(),
            storage_path: std::env::var("STORAGE_PATH")
                .unwrap_or_else(|_| "./data/artworks".to_string()),
            storage_public_url,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("invalid value for {name}: {raw}"))),
        Err(_) => Ok(default),
    }
}

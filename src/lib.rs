//! Creator-Atlas: a quota-aware channel directory harvester
//!
//! This crate crawls a paginated directory API across a (category x city)
//! search space, rotating between multiple quota-limited credentials, and
//! persists progress durably so a multi-hour run can be interrupted and
//! resumed without re-spending quota.

pub mod api;
pub mod checkpoint;
pub mod config;
pub mod crawler;
pub mod output;
pub mod plan;
pub mod quota;
pub mod records;

use thiserror::Error;

/// Main error type for Creator-Atlas operations
#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No usable credentials: {0}")]
    NoUsableCredentials(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] checkpoint::CheckpointError),

    #[error("Request execution error: {0}")]
    Exec(#[from] api::ExecError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task panicked: {0}")]
    WorkerPanic(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Creator-Atlas operations
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use api::{CallOutcome, ExecError, RequestExecutor};
pub use checkpoint::{CheckpointStore, RunCheckpoint};
pub use config::Config;
pub use plan::{CrawlPlanner, SearchTask, TaskStatus};
pub use quota::{CredentialPool, QuotaLedger, RateLimiter};
pub use records::{ChannelRecord, DedupIndex};

// Error types for the grid builder.

use spider_nav::NavError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("build cancelled")]
    Cancelled,

    #[error("world query executor is no longer running")]
    WorldUnavailable,

    #[error("invalid build config: {0}")]
    InvalidConfig(String),

    #[error("saving grid failed: {0}")]
    Persistence(#[from] NavError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BuildError>;

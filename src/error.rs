//! Error types for chronicle

use thiserror::Error;

/// Result type alias for chronicle operations
pub type Result<T> = std::result::Result<T, ChronicleError>;

/// Main error type for chronicle
#[derive(Error, Debug)]
pub enum ChronicleError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("worker error: {0}")]
    Worker(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ChronicleError {
    /// Taxonomy name, per spec §7.
    pub fn code(&self) -> &'static str {
        match self {
            ChronicleError::NotFound(_) => "not_found",
            ChronicleError::InvalidInput(_) | ChronicleError::Archive(_) => "invalid_input",
            ChronicleError::Conflict(_) => "conflict",
            ChronicleError::Database(_) | ChronicleError::Store(_) => "store_error",
            ChronicleError::Worker(_) => "worker_error",
            _ => "internal",
        }
    }

    /// HTTP status code for the axum surface.
    pub fn http_status(&self) -> u16 {
        match self {
            ChronicleError::NotFound(_) => 404,
            ChronicleError::InvalidInput(_) | ChronicleError::Archive(_) => 400,
            ChronicleError::Conflict(_) => 409,
            _ => 500,
        }
    }

    /// Whether a caller may reasonably retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChronicleError::Database(_) | ChronicleError::Io(_))
    }
}

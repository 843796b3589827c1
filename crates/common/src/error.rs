//! Error types shared across StrokeLab crates.
//!
//! Only conditions that make a run meaningless surface here. Per-frame gaps,
//! thin phases and an undetected contact are encoded in the data model
//! instead and never become errors.

use std::path::PathBuf;

/// Top-level error type for StrokeLab operations.
#[derive(Debug, thiserror::Error)]
pub enum StrokeError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Input stream contained no frames")]
    EmptyStream,

    #[error("Frame {current} arrived after frame {previous}; frames must be strictly increasing")]
    OutOfOrder { previous: u64, current: u64 },

    #[error("Analysis error: {message}")]
    Analysis { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StrokeError.
pub type StrokeResult<T> = Result<T, StrokeError>;

impl StrokeError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::Analysis {
            message: msg.into(),
        }
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error means the input itself was unusable.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::EmptyStream | Self::OutOfOrder { .. }
        )
    }
}

//! Error types for the extraction library.
//!
//! [`ExtractError`] covers failures that abort an extraction step or the
//! whole run. Row-level problems never surface here; they are reported as
//! [`TransformFailure`](crate::transform::TransformFailure) values so a batch
//! can count them and keep going.

use thiserror::Error;

/// Main error type for extraction operations.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// The data source handle is not live
    #[error("Data source is not connected: {0}")]
    NotConnected(String),

    /// A query placeholder could not be bound from the run parameters
    #[error("Query parameter error: {0}")]
    QueryParameter(String),

    /// An extraction step failed
    #[error("Extraction step {step} failed: {message}")]
    Step { step: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Extraction was cancelled (SIGINT, etc.)
    #[error("Extraction cancelled")]
    Cancelled,
}

impl ExtractError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        ExtractError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Step error
    pub fn step(step: impl Into<String>, message: impl Into<String>) -> Self {
        ExtractError::Step {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExtractError::Config(_)
            | ExtractError::QueryParameter(_)
            | ExtractError::Yaml(_) => 2,
            ExtractError::Source(_) | ExtractError::Pool { .. } | ExtractError::NotConnected(_) => 3,
            ExtractError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;

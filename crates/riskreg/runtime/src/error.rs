//! Error types for riskreg-runtime

use riskreg_storage::StorageError;
use riskreg_workflow::WorkflowError;
use thiserror::Error;

/// Runtime-level errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage backend could not be opened or seeded
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Seed file could not be read or parsed
    #[error("Seed error: {0}")]
    Seed(String),

    /// Tracing subscriber could not be installed
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for RuntimeError {
    fn from(e: config::ConfigError) -> Self {
        RuntimeError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(e: serde_json::Error) -> Self {
        RuntimeError::Seed(e.to_string())
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

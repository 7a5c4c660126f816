//! Error taxonomy for the simulation core.
//!
//! Expected domain outcomes (unknown procedure on switch, missing sensor data,
//! a non-conforming validation) are not errors and never surface here.

use std::path::PathBuf;

/// Result type for core operations
pub type SimResult<T> = Result<T, SimError>;

/// Errors that abort the current operation and propagate to the caller
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Failed to parse knowledge store: {0}")]
    StoreParse(String),

    #[error("Malformed triple: {0}")]
    InvalidTriple(String),

    #[error("Constraint engine failed: {0}")]
    Engine(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid sensor data: {0}")]
    SensorData(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SimError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SimError::Io {
            path: path.into(),
            source,
        }
    }
}

//! Error types for Stageflow.
//!
//! All errors in Stageflow are represented by the `StageflowError` enum,
//! which provides specific variants for different error categories.

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Stageflow operations.
///
/// Each variant represents a specific category of error that can occur
/// during workflow definition, execution, or storage operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum StageflowError {
    /// Engine-level errors (startup, shutdown, configuration).
    #[error("{0}")]
    Engine(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML, etc.).
    #[error("{0}")]
    Convert(String),

    /// Runtime execution errors.
    #[error("{0}")]
    Runtime(String),

    /// Run lifecycle errors.
    #[error("{0}")]
    Run(String),

    /// Safety-limit violations that abort a run.
    #[error("{0}")]
    Limit(String),

    /// Storage operation errors.
    #[error("{0}")]
    Store(String),

    /// Workflow definition errors.
    #[error("{0}")]
    Workflow(String),

    /// Node definition or execution errors.
    #[error("{0}")]
    Node(String),

    /// Connection definition errors.
    #[error("{0}")]
    Connection(String),

    /// Function library errors.
    #[error("{0}")]
    Function(String),

    /// JSON path errors raised by the parse_json function.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// Inference service errors.
    #[error("{0}")]
    Inference(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),
}

impl From<StageflowError> for String {
    fn from(val: StageflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for StageflowError {
    fn from(error: std::io::Error) -> Self {
        StageflowError::IoError(error.to_string())
    }
}

impl From<StageflowError> for std::io::Error {
    fn from(val: StageflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for StageflowError {
    fn from(_: FromUtf8Error) -> Self {
        StageflowError::Runtime("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for StageflowError {
    fn from(error: serde_json::Error) -> Self {
        StageflowError::Convert(error.to_string())
    }
}

impl From<jsonschema::ValidationError<'_>> for StageflowError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        StageflowError::Runtime(error.to_string())
    }
}

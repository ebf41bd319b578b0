// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for the catalog
#[derive(Error, Debug)]
pub enum Error {
    /// Archive path missing or unreadable
    #[error("Cannot read {}: {source}", path.display())]
    NotReadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// External tool exited with a non-zero status
    #[error("{tool} exited with status {status}: {stderr}")]
    ToolError {
        tool: String,
        status: i32,
        stderr: String,
    },

    /// External tool did not finish in time
    #[error("{tool} did not finish within {seconds}s")]
    Timeout { tool: String, seconds: u64 },

    /// External tool could not be started
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// Tool succeeded but produced nothing usable
    #[error("Unparseable output: {0}")]
    UnparseableOutput(String),

    /// Policy report lacked the information needed to classify
    #[error("Ambiguous classification: {0}")]
    AmbiguousClassification(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Filesystem watcher errors
    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using the catalog's Error type
pub type Result<T> = std::result::Result<T, Error>;

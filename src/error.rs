//! Error types for lexstore
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using LexError
pub type Result<T> = std::result::Result<T, LexError>;

/// Unified error type for lexstore operations
#[derive(Debug, Error)]
pub enum LexError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open store file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // File Format Errors
    // -------------------------------------------------------------------------
    #[error("unsupported writer version {found} (supported: {min} to {max})")]
    UnsupportedVersion {
        found: String,
        min: String,
        max: String,
    },

    #[error("corrupted store file: {0}")]
    Corrupted(String),

    // -------------------------------------------------------------------------
    // Query Errors
    // -------------------------------------------------------------------------
    #[error("content filters require a store built with a path registry")]
    NoFilterSupport,

    // -------------------------------------------------------------------------
    // Writer Errors
    // -------------------------------------------------------------------------
    #[error("source document error: {0}")]
    Source(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

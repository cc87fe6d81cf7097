//! Error types for bar storage.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while saving or loading bars.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to determine the application data directory.
    #[error("Failed to determine application data directory")]
    NoDataDir,

    /// Failed to create a directory.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        /// The path that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to read a file.
    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to write a file.
    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        /// The path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to read directory.
    #[error("Failed to read directory '{path}': {source}")]
    ReadDir {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse a stored bar.
    #[error("Failed to parse bar file '{path}': {source}")]
    ParseJson {
        /// The path that could not be parsed.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Failed to serialize a bar.
    #[error("Failed to serialize bar: {0}")]
    SerializeJson(#[from] serde_json::Error),

    /// The store refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

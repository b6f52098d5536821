//! Error types for flowscrub.
//!
//! This module defines all error types used throughout the flowscrub crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for flowscrub operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// A redaction pattern failed to compile.
    #[error("invalid redaction pattern '{name}': {source}")]
    InvalidPattern {
        /// Name of the pattern.
        name: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    // === Setup Errors ===
    /// The source root is missing or is not a directory.
    #[error("{path} is not a valid directory")]
    SourceNotDirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// The target root would be written inside the tree being redacted.
    #[error("target {target} must not be inside source {source_root}")]
    TargetInsideSource {
        /// The source root.
        source_root: PathBuf,
        /// The requested target root.
        target: PathBuf,
    },

    /// The target root exists and overwriting was not requested.
    #[error("target directory {path} already exists")]
    TargetExists {
        /// The existing target path.
        path: PathBuf,
    },

    /// A document nests deeper than redaction supports.
    #[error("document nests {depth} levels deep, limit is {limit}")]
    NestingTooDeep {
        /// Deepest nesting found.
        depth: usize,
        /// Maximum accepted nesting.
        limit: usize,
    },

    // === Flow Errors ===
    /// A flow source failed to start.
    #[error("failed to start flow source '{name}': {message}")]
    FlowSourceStart {
        /// Name of the flow source.
        name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// A flow could not be turned into a record.
    #[error("invalid flow: {message}")]
    InvalidFlow {
        /// Description of what is wrong with the flow.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a file.
    #[error("failed to read {path}: {source}")]
    FileRead {
        /// Path that couldn't be read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file.
    #[error("failed to write {path}: {source}")]
    FileWrite {
        /// Path that couldn't be written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A file is not valid UTF-8 text.
    #[error("{path} is not valid UTF-8")]
    NotUtf8 {
        /// The offending path.
        path: PathBuf,
    },

    /// Directory traversal failed.
    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for flowscrub operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a new invalid flow error.
    #[must_use]
    pub fn invalid_flow(message: impl Into<String>) -> Self {
        Self::InvalidFlow {
            message: message.into(),
        }
    }

    /// Create a flow source start error.
    #[must_use]
    pub fn flow_source_start(name: &'static str, message: impl Into<String>) -> Self {
        Self::FlowSourceStart {
            name,
            message: message.into(),
        }
    }

    /// Check if this error happened while validating the run, before any
    /// file was touched.
    #[must_use]
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::SourceNotDirectory { .. }
                | Self::TargetInsideSource { .. }
                | Self::TargetExists { .. }
                | Self::ConfigLoad(_)
                | Self::ConfigValidation { .. }
                | Self::InvalidPattern { .. }
        )
    }

    /// Check if this error means the target directory already exists.
    #[must_use]
    pub fn is_target_exists(&self) -> bool {
        matches!(self, Self::TargetExists { .. })
    }
}

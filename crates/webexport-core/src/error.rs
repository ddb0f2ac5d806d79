//! Error types for webexport.
//!
//! Every way an export run can fail has its own variant so the binary can
//! print a precise diagnostic and exit with a distinct status.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for the export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    // External capability errors
    #[error("Export dependency unavailable: {message}")]
    DependencyUnavailable { message: String },

    #[error("Error during conversion: {message}")]
    ExportFailed { message: String },

    #[error("Exported graph does not match configuration: expected input {expected:?}, got {actual:?}")]
    GraphMismatch { expected: Vec<i64>, actual: Vec<i64> },

    // Input errors
    #[error("Model not found at {}", .0.display())]
    CheckpointNotFound(PathBuf),

    #[error("Invalid export settings for {field}: {message}")]
    InvalidSettings { field: String, message: String },

    // File system errors
    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    RelocationFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ExportError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ExportError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Process exit status for this error.
    ///
    /// - 1: other failure (I/O, JSON)
    /// - 2: checkpoint missing
    /// - 3: export dependency unavailable
    /// - 4: export failed or produced a mismatched graph
    /// - 5: relocation failed
    /// - 6: invalid fixed configuration
    pub fn exit_code(&self) -> u8 {
        match self {
            ExportError::CheckpointNotFound(_) => 2,
            ExportError::DependencyUnavailable { .. } => 3,
            ExportError::ExportFailed { .. } | ExportError::GraphMismatch { .. } => 4,
            ExportError::RelocationFailed { .. } => 5,
            ExportError::InvalidSettings { .. } => 6,
            ExportError::Io { .. } | ExportError::Json { .. } => 1,
        }
    }

    /// Hint printed after the diagnostic, if the failure has an obvious remedy.
    pub fn remedy(&self) -> Option<&'static str> {
        match self {
            ExportError::DependencyUnavailable { .. } => Some(
                "Please install ultralytics: pip install ultralytics (or run `webexport setup`)",
            ),
            _ => None,
        }
    }
}

/// Attach path context to `std::io::Result`s.
pub trait IoResultExt<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| ExportError::io_with_path(e, path.as_ref()))
    }
}

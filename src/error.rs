//! Error types for pair comparison
//!
//! Every variant is scoped to a single file pair: the batch runner records it
//! against that pair and carries on with the rest.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for comparator operations
pub type Result<T> = std::result::Result<T, CompareError>;

/// Errors that can occur while comparing two recordings
#[derive(Debug, Error)]
pub enum CompareError {
    /// Sizes, channel counts or calibration metadata disagree
    #[error("Format mismatch: {reason}")]
    FormatMismatch {
        /// What disagreed
        reason: String,
    },

    /// Sample region is empty or not a whole number of samples
    #[error("Empty recording: {path} has {sample_bytes} sample bytes after a {header_size}-byte header")]
    EmptyRecording {
        /// Offending file
        path: PathBuf,
        /// Bytes left after the header (may be negative for truncated headers)
        sample_bytes: i64,
        /// Header size that was skipped
        header_size: u64,
    },

    /// File could not be opened, read or mapped
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Degenerate record layout
    #[error("Invalid layout: {reason}")]
    InvalidLayout {
        /// Reason for failure
        reason: String,
    },

    /// Rejected configuration value
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for failure
        reason: String,
    },

    /// Cancellation observed between windows
    #[error("Comparison aborted after {windows_done} windows")]
    Aborted {
        /// Windows fully processed before cancellation
        windows_done: u64,
    },
}

impl CompareError {
    /// Create a format mismatch error
    pub fn format_mismatch(reason: impl Into<String>) -> Self {
        Self::FormatMismatch {
            reason: reason.into(),
        }
    }

    /// Create an invalid layout error
    pub fn invalid_layout(reason: impl Into<String>) -> Self {
        Self::InvalidLayout {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Wrap an I/O error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Tag used in summaries and the pair matrix
    pub fn tag(&self) -> ErrorTag {
        match self {
            Self::FormatMismatch { .. } => ErrorTag::FormatMismatch,
            Self::EmptyRecording { .. } => ErrorTag::EmptyRecording,
            Self::Io { .. } => ErrorTag::IoError,
            Self::InvalidLayout { .. } => ErrorTag::InvalidLayout,
            Self::InvalidConfig { .. } => ErrorTag::InvalidConfig,
            Self::Aborted { .. } => ErrorTag::Aborted,
        }
    }
}

/// Structural error tag reported in place of numeric summary fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorTag {
    FormatMismatch,
    EmptyRecording,
    IoError,
    InvalidLayout,
    InvalidConfig,
    Aborted,
}

impl ErrorTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FormatMismatch => "FORMAT MISMATCH",
            Self::EmptyRecording => "EMPTY RECORDING",
            Self::IoError => "IO ERROR",
            Self::InvalidLayout => "INVALID LAYOUT",
            Self::InvalidConfig => "INVALID CONFIG",
            Self::Aborted => "ABORTED",
        }
    }
}

impl std::fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Error types for scanning, converting and running batches.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::format::{SourceKind, TargetFormat};

/// Errors raised while listing an input directory.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Input directory is missing, not a directory, or unreadable.
    #[error("input directory not found: {path}")]
    DirectoryNotFound {
        path: PathBuf,
        #[source]
        source: Option<io::Error>,
    },
}

/// Errors a single conversion job can end with.
///
/// None of these abort a batch; each one becomes the failure message of the
/// job it happened in.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// No converter is registered for this source/target pair.
    #[error("conversion from {source_kind} to {target} is not supported")]
    NotSupported { source_kind: String, target: String },

    #[error("cannot read {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {path}: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed input or an encoder failure.
    #[error("codec error in {path}: {reason}")]
    Codec { path: PathBuf, reason: String },

    /// Output could not be completed; nothing was left at the destination.
    #[error("partial write to {path} discarded: {source}")]
    PartialWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A worker could not be started for this job.
    #[error("failed to start conversion task: {reason}")]
    ThreadCreationFailed { reason: String },

    /// The batch was cancelled before this job was admitted.
    #[error("conversion cancelled before it started")]
    Cancelled,

    /// The converter panicked.
    #[error("converter crashed: {reason}")]
    Panicked { reason: String },
}

impl ConversionError {
    pub fn not_supported(kind: Option<SourceKind>, target: TargetFormat) -> Self {
        Self::NotSupported {
            source_kind: kind
                .map(|k| k.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            target: target.to_string(),
        }
    }

    pub fn codec(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Codec {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Setup errors; these abort a batch before any job starts.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("output directory {path} is not usable: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parsing config {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

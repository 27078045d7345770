//! Error types for ChromaFlux operations.
//!
//! Extraction absorbs shape mismatches locally (see [`crate::extract`]).
//! Conversion and file errors propagate as hard failures for their unit of
//! work: one asset during a load, one document during a commit.

use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

/// ChromaFlux result type alias
pub type Result<T> = std::result::Result<T, ChromaError>;

/// Error category for structured logging and exit-code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An expected file is absent (input asset, input JSON, converter output)
    NotFound,
    /// The external converter signaled failure or produced no output
    ConversionFailed,
    /// A recognized module's vector node is not shaped as expected
    MalformedNode,
    /// One or more documents failed to rebuild during commit
    PartialCommitFailure,
    /// Filesystem I/O failure
    Io,
    /// JSON parse or serialization failure
    Json,
    /// Configuration could not be read or is invalid
    Config,
    /// Groups were computed before the last load or commit
    StaleGroups,
    /// An entry id does not belong to the current session
    UnknownEntry,
    /// An input file is not a `.uasset` the converter can round-trip
    UnsupportedAsset,
    /// Intermediate JSON from an earlier run sits where an export would go
    LeftoverJson,
}

impl ErrorKind {
    /// Machine-readable code for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::ConversionFailed => "CONVERSION_FAILED",
            Self::MalformedNode => "MALFORMED_NODE",
            Self::PartialCommitFailure => "PARTIAL_COMMIT_FAILURE",
            Self::Io => "IO_ERROR",
            Self::Json => "JSON_ERROR",
            Self::Config => "CONFIG_ERROR",
            Self::StaleGroups => "STALE_GROUPS",
            Self::UnknownEntry => "UNKNOWN_ENTRY",
            Self::UnsupportedAsset => "UNSUPPORTED_ASSET",
            Self::LeftoverJson => "LEFTOVER_JSON",
        }
    }
}

/// A document that could not be committed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDocument {
    pub json_path: PathBuf,
    pub reason: String,
}

/// ChromaFlux error taxonomy
#[derive(Debug, Error)]
pub enum ChromaError {
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("conversion failed for {path}: {reason}")]
    ConversionFailed { path: PathBuf, reason: String },

    #[error("malformed node {pointer} in {document}: {reason}")]
    MalformedNode {
        document: PathBuf,
        pointer: String,
        reason: String,
    },

    #[error(
        "commit failed for {} of {} documents",
        .failed.len(),
        .failed.len() + .committed.len()
    )]
    PartialCommitFailure {
        committed: Vec<PathBuf>,
        failed: Vec<FailedDocument>,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("config error: {message}")]
    Config { message: String },

    #[error(
        "groups were computed for generation {group_generation} but the session is at {session_generation}; regroup first"
    )]
    StaleGroups {
        group_generation: u64,
        session_generation: u64,
    },

    #[error("unknown entry id {0}")]
    UnknownEntry(usize),

    #[error("{path} is not a .uasset file")]
    UnsupportedAsset { path: PathBuf },

    #[error(
        "intermediate JSON {path} is left over from an earlier run and may hold uncommitted edits; move or remove it first"
    )]
    LeftoverJson { path: PathBuf },
}

impl ChromaError {
    /// Get the error category
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ConversionFailed { .. } => ErrorKind::ConversionFailed,
            Self::MalformedNode { .. } => ErrorKind::MalformedNode,
            Self::PartialCommitFailure { .. } => ErrorKind::PartialCommitFailure,
            Self::Io { .. } => ErrorKind::Io,
            Self::Json { .. } => ErrorKind::Json,
            Self::Config { .. } => ErrorKind::Config,
            Self::StaleGroups { .. } => ErrorKind::StaleGroups,
            Self::UnknownEntry(_) => ErrorKind::UnknownEntry,
            Self::UnsupportedAsset { .. } => ErrorKind::UnsupportedAsset,
            Self::LeftoverJson { .. } => ErrorKind::LeftoverJson,
        }
    }

    /// Wrap an I/O error, mapping `ErrorKind::NotFound` onto [`ChromaError::NotFound`].
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    pub fn conversion_failed(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::ConversionFailed {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn malformed(
        document: impl AsRef<Path>,
        pointer: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedNode {
            document: document.as_ref().to_path_buf(),
            pointer: pointer.into(),
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

//! Error types for the repackaging pipeline.
//!
//! The taxonomy mirrors the failure classes of the pipeline: pre-flight
//! validation, external tool exits, metadata parsing, and filesystem work.
//! Step failures are aggregated into [`Error::Task`] by the task runner,
//! which is the only error the orchestrator surfaces to callers.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for all repackaging operations
#[derive(Error, Debug)]
pub enum Error {
    /// Pre-flight check failed before any work began
    #[error("validation failed: {0}")]
    Validation(String),

    /// An external tool exited with a non-zero status
    #[error("{tool} exited with status {status}")]
    Tool {
        /// Tool display name
        tool: String,
        /// Exit status (-1 when killed by a signal)
        status: i32,
    },

    /// An external tool could not be launched at all
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        /// Tool display name
        tool: String,
        /// Underlying launch error
        source: io::Error,
    },

    /// An external tool exceeded the configured wall-clock limit
    #[error("{tool} timed out after {timeout:?}")]
    Timeout {
        /// Tool display name
        tool: String,
        /// The limit that was exceeded
        timeout: Duration,
    },

    /// Decoded package metadata was malformed or incomplete
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Filesystem operation failed, with the path it was working on
    #[error("{context} ({path}): {source}")]
    Fs {
        /// What the operation was doing
        context: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying IO error
        source: io::Error,
    },

    /// IO errors without richer path context
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Manifest XML parsing errors
    #[error("manifest error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Archive read/write errors
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The run was cancelled between steps
    #[error("run cancelled")]
    Cancelled,

    /// A named pipeline step failed; carries elapsed time and the cause
    #[error("task '{name}' failed after {elapsed:?}: {source}")]
    Task {
        /// Task name as reported to the log
        name: String,
        /// Wall-clock duration until the failure
        elapsed: Duration,
        /// Underlying failure
        source: Box<Error>,
    },

    /// Generic errors
    #[error("{0}")]
    Generic(String),
}

impl Error {
    /// True when this error (or the failure it wraps) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Task { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Constructs an [`Error::Generic`] from format arguments and returns it.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::repack::Error::Generic(format!($($arg)*)))
    };
}

/// Extension trait adding a message to `None` values
pub trait Context<T> {
    /// Converts `None` into [`Error::Generic`] with the given message.
    fn context(self, msg: &str) -> Result<T>;
}

impl<T> Context<T> for Option<T> {
    fn context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| Error::Generic(msg.to_string()))
    }
}

/// Extension trait attaching path context to IO results
pub trait ErrorExt<T> {
    /// Wraps an IO error as [`Error::Fs`] with the operation and path.
    fn fs_context(self, context: &'static str, path: &Path) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, io::Error> {
    fn fs_context(self, context: &'static str, path: &Path) -> Result<T> {
        self.map_err(|source| Error::Fs {
            context,
            path: path.to_path_buf(),
            source,
        })
    }
}

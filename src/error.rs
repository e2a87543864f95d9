//! Top-level error types for the CLI surface.

use thiserror::Error;

/// Result type alias for CLI-level operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Main error type surfaced by the binary
#[derive(Error, Debug)]
pub enum AppError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Pipeline errors
    #[error(transparent)]
    Repack(#[from] crate::repack::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

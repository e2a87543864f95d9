//! Repackages a compiled APK into a signed Android App Bundle.
//!
//! The heavy lifting (decoding, resource linking, bundling, signing) is
//! delegated to external tools; this crate orchestrates them into one
//! fail-fast pipeline with a guaranteed temporary-workspace cleanup.
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod cli;
pub mod error;
pub mod repack;

// Re-export commonly used types
pub use error::{AppError, CliError, Result};
pub use repack::{BuildContext, Repacker, SigningConfig, ToolPaths};

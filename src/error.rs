// src/error.rs

//! Error types for build composition
//!
//! Resolution errors (timestamps, platforms, features, catalogs) and
//! composition preconditions (lock file, source tree) are raised before any
//! toolchain is started. Toolchain errors carry the captured diagnostics.

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed timestamp '{timestamp}': {reason}")]
    MalformedTimestamp { timestamp: String, reason: String },

    #[error("Unsupported platform '{platform}' (supported: linux, macos)")]
    UnsupportedPlatform { platform: String },

    #[error("Unknown feature '{0}' (known: gtk-file-picker, wasm)")]
    UnknownFeature(String),

    #[error("Lock file {} is missing or unreadable: {reason}", path.display())]
    MissingLockFile { path: PathBuf, reason: String },

    #[error("Source tree {} contains no files after filtering", root.display())]
    EmptySource { root: PathBuf },

    #[error("Catalog conflict: '{name}' is listed for both linux and macos")]
    CatalogConflict { name: String },

    #[error("Build failed ({status}):\n{diagnostics}")]
    BuildFailure { diagnostics: String, status: String },

    #[error("Build interrupted by {signal}")]
    Interrupted { signal: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Whether this error was raised before any toolchain invocation
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedTimestamp { .. }
                | Self::UnsupportedPlatform { .. }
                | Self::UnknownFeature(_)
                | Self::MissingLockFile { .. }
                | Self::EmptySource { .. }
                | Self::CatalogConflict { .. }
        )
    }

    /// Interrupted builds are a distinguished kind of build failure
    pub fn is_build_failure(&self) -> bool {
        matches!(self, Self::BuildFailure { .. } | Self::Interrupted { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        let path = err
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        Self::IoError(format!("{}: {}", path, err))
    }
}

use std::path::PathBuf;

use thiserror::Error;

/// Library error type for frameshow operations.
///
/// Per-item failures (a file that vanished, a frame that failed to decode)
/// are absorbed close to where they happen and logged; only the variants
/// below cross module boundaries.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured media library root is missing or not a directory.
    #[error("invalid media library: {0}")]
    BadLibrary(String),

    /// A catalog query or record lookup failed.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Image or video frame could not be decoded.
    #[error("decode failure for {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Display surface could not be created. The only fatal variant:
    /// startup aborts with a non-zero status.
    #[error("display init failed: {0}")]
    DisplayInit(String),
}

pub type Result<T> = std::result::Result<T, Error>;

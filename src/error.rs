//! Error types for the zephyr-cache library.

use thiserror::Error;

use crate::worker::LifecycleState;

/// Errors that can occur while installing into or serving from a cache bucket.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error during storage operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An asset answered with a status outside 200-299.
    #[error("{url} responded with status {status}")]
    Status {
        /// URL of the failing asset.
        url: String,
        /// Status code the origin returned.
        status: u16,
    },

    /// Install aborted because one asset could not be cached.
    #[error("install failed on {url}: {source}")]
    Install {
        /// URL of the asset that failed.
        url: String,
        /// Underlying failure.
        source: Box<Error>,
    },

    /// A lifecycle operation was invoked in the wrong state.
    #[error("cannot {operation} while worker is {state}")]
    Lifecycle {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the worker was in.
        state: LifecycleState,
    },

    /// Bucket name contains characters outside `[A-Za-z0-9._-]`.
    #[error("invalid cache bucket name: {0:?}")]
    InvalidBucketName(String),

    /// Configuration is malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Stored entry metadata could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Returns true if this error aborted an install.
    #[must_use]
    pub const fn is_install_failure(&self) -> bool {
        matches!(self, Self::Install { .. })
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// A specialized `Result` type for zephyr-cache operations.
pub type Result<T> = std::result::Result<T, Error>;

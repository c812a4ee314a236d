//! Error types for artmeta-storage.

use std::path::PathBuf;

use thiserror::Error;

use artmeta_core::{DocumentHandle, Fingerprint, GeolocationError};

pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Local filesystem failure, with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API answered with an error status.
    #[error("{operation} failed with status {status} ({code}): {message}")]
    Api {
        operation: String,
        status: u16,
        code: String,
        message: String,
    },

    /// Metadata failed validation; nothing was written.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(#[from] GeolocationError),

    /// The document does not exist (or is not a finalized upload).
    #[error("document not found: {document}")]
    NotFound { document: DocumentHandle },

    /// Stored content no longer matches the bytes the metadata was decoded
    /// from; nothing was written.
    #[error("content of {document} changed since it was read (expected {expected}, found {actual})")]
    ContentChanged {
        document: DocumentHandle,
        expected: Fingerprint,
        actual: Fingerprint,
    },

    /// The handle cannot address a document in this store.
    #[error("invalid document handle '{document}': {reason}")]
    InvalidDocument {
        document: DocumentHandle,
        reason: &'static str,
    },

    /// Configured bucket is not visible to the credentials.
    #[error("bucket '{0}' not found")]
    BucketNotFound(String),

    /// JSON encode/decode failure (attribute sidecars).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The remote API answered with something we cannot use.
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

/// Convenience constructor for [`StorageError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.into(),
        source,
    }
}

//! The storage capability consumed by the sync engine.

use async_trait::async_trait;
use tokio::io::AsyncRead;

use artmeta_core::{DocumentHandle, Fingerprint, Metadata};

use crate::error::Result;

/// Only documents with this extension are listed.
pub const DOCUMENT_EXTENSION: &str = ".md";

/// Owned byte stream for one document. Dropping it releases the underlying
/// file handle or connection.
pub type DocumentReader = Box<dyn AsyncRead + Send + Unpin>;

/// An open document.
pub struct DocumentStream {
    pub reader: DocumentReader,
    /// Length reported by the store. Readers must not trust a single read
    /// call to return this many bytes.
    pub declared_len: u64,
}

/// A document store that can be scanned and annotated with metadata.
///
/// Implementations hold no per-document mutable state, so every method may be
/// called concurrently for different documents.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Backend type tag, used in logs.
    fn name(&self) -> &'static str;

    /// Enumerate finalized documents ending in [`DOCUMENT_EXTENSION`] under
    /// the configured scope.
    async fn list(&self) -> Result<Vec<DocumentHandle>>;

    /// Whether the document's current content fingerprint differs from the one
    /// recorded by the last successful metadata write (or none was recorded).
    async fn changed(&self, document: &DocumentHandle) -> Result<bool>;

    /// Open the document for reading.
    async fn read(&self, document: &DocumentHandle) -> Result<DocumentStream>;

    /// Validate `metadata`, then attach it plus `expected` as attributes.
    ///
    /// `expected` is the fingerprint of the bytes `metadata` was decoded from.
    /// If the stored content no longer hashes to it, the write fails with
    /// [`StorageError::ContentChanged`](crate::StorageError::ContentChanged)
    /// so the next run sees the document as changed. Validation failures have
    /// no side effects, and a failed write leaves the previous attributes in
    /// place.
    ///
    /// Returns the fingerprint that was recorded.
    async fn write_metadata(
        &self,
        document: &DocumentHandle,
        metadata: &Metadata,
        expected: &Fingerprint,
    ) -> Result<Fingerprint>;
}

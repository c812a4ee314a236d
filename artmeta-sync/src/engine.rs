//! Bounded-concurrency synchronization engine.
//!
//! ## Per-document steps
//!
//! 1. `changed` on the backend; unchanged documents are skipped. A failed
//!    check counts as changed.
//! 2. `read` the whole document; the stream is dropped before extraction.
//! 3. Extract the header. No header means the document is not managed.
//! 4. Validate the decoded metadata.
//! 5. `write_metadata` with the fingerprint of the bytes read, unless this is
//!    a dry run. A backend refuses the write if the content moved since.
//!
//! Each document runs on its own tokio task holding one semaphore permit, so
//! at most `max_concurrent_jobs` documents are in flight at once.

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use artmeta_core::{frontmatter, DocumentHandle};
use artmeta_storage::{fingerprint, StorageClient, StorageError};

use crate::error::SyncError;
use crate::report::{FailureStage, ItemOutcome, SyncReport};

/// Upper bound on the buffer reserved up front from a declared length.
const MAX_PREALLOCATION: u64 = 8 * 1024 * 1024;

/// Knobs for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Documents processed concurrently; values below 1 are treated as 1.
    pub max_concurrent_jobs: usize,
    /// Do everything except `write_metadata`.
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            dry_run: false,
        }
    }
}

pub struct SyncEngine {
    storage: Arc<dyn StorageClient>,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(storage: Arc<dyn StorageClient>, options: SyncOptions) -> Self {
        Self { storage, options }
    }

    /// Process every listed document once.
    ///
    /// Returns `Err` only when listing fails; per-document failures are in
    /// the report.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let backend = self.storage.name();
        info!(backend, "scanning documents");
        let documents = self
            .storage
            .list()
            .await
            .map_err(|source| SyncError::List { backend, source })?;
        info!(backend, file_count = documents.len(), "scan complete");

        let permits = Arc::new(Semaphore::new(self.options.max_concurrent_jobs.max(1)));
        let dry_run = self.options.dry_run;
        let mut workers: Vec<(DocumentHandle, JoinHandle<ItemOutcome>)> =
            Vec::with_capacity(documents.len());

        for document in documents {
            // The semaphore is never closed, so acquisition cannot fail.
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let storage = Arc::clone(&self.storage);
            let handle = document.clone();
            let worker = tokio::spawn(async move {
                let outcome = process(storage.as_ref(), &handle, dry_run).await;
                drop(permit);
                outcome
            });
            workers.push((document, worker));
        }

        let mut report = SyncReport::new(dry_run);
        for (document, worker) in workers {
            let outcome = match worker.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(document = %document, error = %err, "worker terminated abnormally");
                    ItemOutcome::failed(FailureStage::Worker, err)
                }
            };
            report.record(document, outcome);
        }

        info!(
            backend,
            written = report.written,
            would_write = report.would_write,
            unchanged = report.unchanged,
            no_header = report.no_header,
            failed = report.failed,
            "sync finished"
        );
        Ok(report)
    }
}

/// Run the per-document steps and classify the result.
async fn process(
    storage: &dyn StorageClient,
    document: &DocumentHandle,
    dry_run: bool,
) -> ItemOutcome {
    match storage.changed(document).await {
        Ok(false) => {
            debug!(document = %document, "unchanged, skipping");
            return ItemOutcome::Unchanged;
        }
        Ok(true) => {}
        Err(err) => {
            warn!(document = %document, error = %err, "change check failed, treating as changed");
        }
    }

    debug!(document = %document, "processing");
    let content = match read_document(storage, document).await {
        Ok(content) => content,
        Err(err) => {
            warn!(document = %document, error = %err, "read failed");
            return ItemOutcome::failed(FailureStage::Read, err);
        }
    };

    let metadata = match frontmatter::extract(&content) {
        Ok(extracted) => match extracted.metadata {
            Some(metadata) => metadata,
            None => {
                debug!(document = %document, "no header, skipping");
                return ItemOutcome::NoHeader;
            }
        },
        Err(err) => {
            warn!(document = %document, error = %err, "header decode failed");
            return ItemOutcome::failed(FailureStage::Decode, err);
        }
    };

    if let Err(err) = metadata.validate() {
        warn!(document = %document, error = %err, "invalid metadata");
        return ItemOutcome::failed(FailureStage::Validate, err);
    }

    if dry_run {
        info!(document = %document, "[dry-run] would write metadata");
        return ItemOutcome::WouldWrite;
    }

    match storage
        .write_metadata(document, &metadata, &fingerprint(&content))
        .await
    {
        Ok(recorded) => {
            info!(document = %document, fingerprint = %recorded, "wrote metadata");
            ItemOutcome::Written {
                fingerprint: recorded,
            }
        }
        Err(err) => {
            warn!(document = %document, error = %err, "metadata write failed");
            ItemOutcome::failed(FailureStage::Write, err)
        }
    }
}

/// Read a document to EOF. The stream is released before returning on every
/// path.
async fn read_document(
    storage: &dyn StorageClient,
    document: &DocumentHandle,
) -> Result<Vec<u8>, StorageError> {
    let mut stream = storage.read(document).await?;
    let declared_len = stream.declared_len;
    let capacity = usize::try_from(declared_len.min(MAX_PREALLOCATION)).unwrap_or(0);
    let mut content = Vec::with_capacity(capacity);

    let result = stream.reader.read_to_end(&mut content).await;
    drop(stream);
    result.map_err(|source| StorageError::Io {
        path: document.as_str().into(),
        source,
    })?;

    if declared_len != 0 && declared_len != content.len() as u64 {
        debug!(
            document = %document,
            expected = declared_len,
            actual = content.len(),
            "read size differs from declared length"
        );
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_sequential_and_live() {
        let options = SyncOptions::default();
        assert_eq!(options.max_concurrent_jobs, 1);
        assert!(!options.dry_run);
    }
}

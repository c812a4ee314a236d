//! Error types for artmeta-sync.

use thiserror::Error;

use artmeta_storage::StorageError;

/// Errors that abort a whole sync run.
///
/// Per-document failures never surface here; they are recorded as
/// [`crate::ItemOutcome::Failed`] in the run report.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Listing is the one precondition every document depends on.
    #[error("failed to list documents on {backend} storage")]
    List {
        backend: &'static str,
        #[source]
        source: StorageError,
    },
}

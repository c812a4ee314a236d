//! Backend selection from the type-tagged storage config.

use std::sync::Arc;

use artmeta_core::StorageConfig;

use crate::b2::B2Storage;
use crate::client::StorageClient;
use crate::error::Result;
use crate::local::FsStorage;

/// Build the backend named by `config`.
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn StorageClient>> {
    let client: Arc<dyn StorageClient> = match config {
        StorageConfig::B2(b2) => Arc::new(B2Storage::connect(b2).await?),
        StorageConfig::Fs(fs) => Arc::new(FsStorage::new(fs)),
    };
    tracing::info!(storage_type = config.type_tag(), "initialized storage client");
    Ok(client)
}

//! Local directory backend (`"Type": "fs"`).
//!
//! # Layout
//!
//! ```text
//! <Root>/<Prefix>/
//!   2024/kyoto.md              document
//!   2024/kyoto.md.attrs.json   attributes written by the last sync
//! ```
//!
//! Sidecars are replaced with the `.tmp` + rename pattern, so a failed write
//! leaves the previous attributes intact. Hidden entries are never listed.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use artmeta_core::{DocumentHandle, Fingerprint, FsConfig, Metadata};

use crate::attributes::{ensure_unchanged, fingerprint, MetadataAttributes};
use crate::client::{DocumentStream, StorageClient, DOCUMENT_EXTENSION};
use crate::error::{io_err, Result, StorageError};

const SIDECAR_SUFFIX: &str = ".attrs.json";

/// Documents stored as plain files under a base directory.
#[derive(Debug, Clone)]
pub struct FsStorage {
    base: PathBuf,
}

impl FsStorage {
    pub fn new(config: &FsConfig) -> Self {
        let prefix = config.prefix.trim_matches('/');
        let base = if prefix.is_empty() {
            config.root.clone()
        } else {
            config.root.join(prefix)
        };
        Self { base }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Absolute path of a document, refusing handles that escape the base.
    pub fn document_path(&self, document: &DocumentHandle) -> Result<PathBuf> {
        let relative = Path::new(document.as_str());
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if document.as_str().is_empty() || escapes {
            return Err(StorageError::InvalidDocument {
                document: document.clone(),
                reason: "must be a relative path without '..'",
            });
        }
        Ok(self.base.join(relative))
    }

    /// `<document>.attrs.json`
    pub fn sidecar_path(document_path: &Path) -> PathBuf {
        let mut name = document_path.as_os_str().to_os_string();
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    /// Attributes recorded by the last successful write, if any.
    pub async fn load_attributes(&self, document: &DocumentHandle) -> Result<Option<MetadataAttributes>> {
        let path = Self::sidecar_path(&self.document_path(document)?);
        match tokio::fs::read(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(&path, err)),
        }
    }

    async fn read_content(&self, document: &DocumentHandle) -> Result<Vec<u8>> {
        let path = self.document_path(document)?;
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::NotFound {
                document: document.clone(),
            }),
            Err(err) => Err(io_err(&path, err)),
        }
    }

    fn handle_for(&self, path: &Path) -> Option<DocumentHandle> {
        let relative = path.strip_prefix(&self.base).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(DocumentHandle(parts.join("/")))
    }
}

#[async_trait]
impl StorageClient for FsStorage {
    fn name(&self) -> &'static str {
        "fs"
    }

    async fn list(&self) -> Result<Vec<DocumentHandle>> {
        let mut documents = Vec::new();
        let mut pending = vec![self.base.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| io_err(&dir, e))?;
            while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(&dir, e))? {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with('.') {
                    continue;
                }

                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| io_err(&path, e))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() && name.ends_with(DOCUMENT_EXTENSION) {
                    if let Some(handle) = self.handle_for(&path) {
                        documents.push(handle);
                    }
                }
            }
        }

        documents.sort();
        Ok(documents)
    }

    async fn changed(&self, document: &DocumentHandle) -> Result<bool> {
        let current = fingerprint(&self.read_content(document).await?);
        let recorded = self
            .load_attributes(document)
            .await?
            .and_then(|attrs| attrs.fingerprint());
        Ok(recorded.as_ref() != Some(&current))
    }

    async fn read(&self, document: &DocumentHandle) -> Result<DocumentStream> {
        let path = self.document_path(document)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    document: document.clone(),
                })
            }
            Err(err) => return Err(io_err(&path, err)),
        };
        let declared_len = file.metadata().await.map_err(|e| io_err(&path, e))?.len();
        Ok(DocumentStream {
            reader: Box::new(file),
            declared_len,
        })
    }

    async fn write_metadata(
        &self,
        document: &DocumentHandle,
        metadata: &Metadata,
        expected: &Fingerprint,
    ) -> Result<Fingerprint> {
        metadata.validate()?;

        let content = self.read_content(document).await?;
        let fingerprint = ensure_unchanged(document, &content, expected)?;
        let attrs = MetadataAttributes::build(metadata, &fingerprint)?;
        let json = serde_json::to_vec_pretty(&attrs)?;

        let sidecar = Self::sidecar_path(&self.document_path(document)?);
        let mut tmp = sidecar.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &json).await.map_err(|e| io_err(&tmp, e))?;
        if let Err(err) = tokio::fs::rename(&tmp, &sidecar).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(&sidecar, err));
        }

        tracing::debug!(document = %document, fingerprint = %fingerprint, "wrote attribute sidecar");
        Ok(fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(root: &str, prefix: &str) -> FsStorage {
        FsStorage::new(&FsConfig {
            root: PathBuf::from(root),
            prefix: prefix.to_string(),
        })
    }

    #[test]
    fn prefix_is_joined_onto_root() {
        assert_eq!(storage("/srv", "").base(), Path::new("/srv"));
        assert_eq!(storage("/srv", "/articles/").base(), Path::new("/srv/articles"));
    }

    #[test]
    fn handles_cannot_escape_base() {
        let fs = storage("/srv", "articles");
        assert!(fs.document_path(&DocumentHandle::from("../secret.md")).is_err());
        assert!(fs.document_path(&DocumentHandle::from("/etc/passwd")).is_err());
        assert!(fs.document_path(&DocumentHandle::from("")).is_err());
        assert_eq!(
            fs.document_path(&DocumentHandle::from("2024/a.md")).unwrap(),
            PathBuf::from("/srv/articles/2024/a.md")
        );
    }

    #[test]
    fn sidecar_sits_next_to_document() {
        assert_eq!(
            FsStorage::sidecar_path(Path::new("/srv/a.md")),
            PathBuf::from("/srv/a.md.attrs.json")
        );
    }
}

//! Attribute schema written onto synchronized documents.
//!
//! | key                          | value                                   |
//! |------------------------------|-----------------------------------------|
//! | `title`                      | `title`                                 |
//! | `short-description`          | `shortDescription`                      |
//! | `action-date`                | `actionDate`                            |
//! | `published-time`             | `publishedTime`, RFC 3339 UTC seconds   |
//! | `thumbnail`                  | `thumbnail`                             |
//! | `tags`                       | `tags` joined with `,`                  |
//! | `geolocation`                | `geolocation` verbatim                  |
//! | `metadata-last-update-sha1`  | fingerprint of the content written      |
//!
//! Absent fields are written as empty strings so every key is always present.

use std::collections::BTreeMap;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use artmeta_core::{DocumentHandle, Fingerprint, GeolocationError, Metadata};

use crate::error::StorageError;

pub const TITLE: &str = "title";
pub const SHORT_DESCRIPTION: &str = "short-description";
pub const ACTION_DATE: &str = "action-date";
pub const PUBLISHED_TIME: &str = "published-time";
pub const THUMBNAIL: &str = "thumbnail";
pub const TAGS: &str = "tags";
pub const GEOLOCATION: &str = "geolocation";
pub const FINGERPRINT: &str = "metadata-last-update-sha1";

/// Lowercase hex SHA-1 of `content`.
pub fn fingerprint(content: &[u8]) -> Fingerprint {
    let mut hasher = Sha1::new();
    hasher.update(content);
    Fingerprint(hex::encode(hasher.finalize()))
}

/// Fingerprint of `content`, failing unless it equals `expected`.
pub fn ensure_unchanged(
    document: &DocumentHandle,
    content: &[u8],
    expected: &Fingerprint,
) -> Result<Fingerprint, StorageError> {
    let actual = fingerprint(content);
    if &actual != expected {
        return Err(StorageError::ContentChanged {
            document: document.clone(),
            expected: expected.clone(),
            actual,
        });
    }
    Ok(actual)
}

/// The full attribute set for one document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataAttributes(BTreeMap<String, String>);

impl MetadataAttributes {
    /// Build the attribute set, rejecting an invalid geolocation first.
    pub fn build(metadata: &Metadata, fingerprint: &Fingerprint) -> Result<Self, GeolocationError> {
        metadata.validate()?;

        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        let published_time = metadata
            .published_time
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();
        let tags = metadata
            .tags
            .as_deref()
            .map(|tags| tags.join(","))
            .unwrap_or_default();

        let mut attrs = BTreeMap::new();
        attrs.insert(TITLE.to_string(), text(&metadata.title));
        attrs.insert(SHORT_DESCRIPTION.to_string(), text(&metadata.short_description));
        attrs.insert(ACTION_DATE.to_string(), text(&metadata.action_date));
        attrs.insert(PUBLISHED_TIME.to_string(), published_time);
        attrs.insert(THUMBNAIL.to_string(), text(&metadata.thumbnail));
        attrs.insert(TAGS.to_string(), tags);
        attrs.insert(GEOLOCATION.to_string(), text(&metadata.geolocation));
        attrs.insert(FINGERPRINT.to_string(), fingerprint.0.clone());
        Ok(Self(attrs))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Fingerprint recorded by the write that produced these attributes.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.get(FINGERPRINT).map(Fingerprint::from)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

//! B2 native API v2 request and response bodies.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeAccountResponse {
    pub account_id: String,
    pub authorization_token: String,
    pub api_url: String,
    pub download_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBucketsRequest<'a> {
    pub account_id: &'a str,
    pub bucket_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBucketsResponse {
    pub buckets: Vec<Bucket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub bucket_id: String,
    pub bucket_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFileNamesRequest<'a> {
    pub bucket_id: &'a str,
    pub prefix: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_file_name: Option<&'a str>,
    pub max_file_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFileNamesResponse {
    pub files: Vec<B2File>,
    pub next_file_name: Option<String>,
}

/// One object version as returned by `b2_list_file_names`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct B2File {
    pub file_name: String,
    #[serde(default)]
    pub content_sha1: Option<String>,
    /// `upload` for finalized objects; `start` marks an unfinished large file.
    pub action: String,
    #[serde(default)]
    pub file_info: HashMap<String, String>,
}

impl B2File {
    pub fn is_uploaded(&self) -> bool {
        self.action == "upload"
    }

    /// Content SHA-1, falling back to `large_file_sha1` for multi-part uploads.
    pub fn content_sha1(&self) -> Option<&str> {
        let sha1 = self
            .content_sha1
            .as_deref()
            .map(|s| s.strip_prefix("unverified:").unwrap_or(s))
            .filter(|s| !s.is_empty() && *s != "none");
        sha1.or_else(|| self.file_info.get("large_file_sha1").map(String::as_str))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUploadUrlRequest<'a> {
    pub bucket_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUploadUrlResponse {
    pub upload_url: String,
    pub authorization_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

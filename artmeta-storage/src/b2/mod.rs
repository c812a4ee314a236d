//! Backblaze B2 backend (`"Type": "b2"`), native API v2.
//!
//! B2 cannot change the info of an existing file version, so writing metadata
//! downloads the current bytes and uploads them again with the new
//! `X-Bz-Info-*` attributes. The upload only happens when those bytes still
//! hash to the fingerprint the metadata was decoded from; that SHA-1 is what
//! B2 then reports as `contentSha1` for the new version.

mod types;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::io::StreamReader;
use tracing::{debug, instrument};

use artmeta_core::{B2Config, DocumentHandle, Fingerprint, Metadata};

use crate::attributes::{self, MetadataAttributes};
use crate::client::{DocumentStream, StorageClient, DOCUMENT_EXTENSION};
use crate::error::{Result, StorageError};

pub use types::B2File;
use types::{
    ApiErrorBody, AuthorizeAccountResponse, GetUploadUrlRequest, GetUploadUrlResponse,
    ListBucketsRequest, ListBucketsResponse, ListFileNamesRequest, ListFileNamesResponse,
};

/// Public authorization endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.backblazeb2.com";

/// Page size for `b2_list_file_names` (API maximum without extra billing).
const LIST_PAGE_SIZE: u32 = 1000;

const CONTENT_TYPE_MARKDOWN: &str = "text/markdown; charset=utf-8";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// An authorized session bound to one bucket.
pub struct B2Storage {
    http: Client,
    api_url: String,
    download_url: String,
    authorization_token: String,
    bucket_id: String,
    bucket_name: String,
    prefix: String,
}

impl B2Storage {
    /// Authorize with the account key and resolve the configured bucket.
    #[instrument(skip(config), fields(bucket = %config.bucket_name))]
    pub async fn connect(config: &B2Config) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let endpoint = config
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/');

        let response = http
            .get(format!("{endpoint}/b2api/v2/b2_authorize_account"))
            .basic_auth(&config.key_id, Some(&config.application_key))
            .send()
            .await?;
        let auth: AuthorizeAccountResponse = check("b2_authorize_account", response)
            .await?
            .json()
            .await?;

        let mut storage = Self {
            http,
            api_url: auth.api_url.trim_end_matches('/').to_string(),
            download_url: auth.download_url.trim_end_matches('/').to_string(),
            authorization_token: auth.authorization_token,
            bucket_id: String::new(),
            bucket_name: config.bucket_name.clone(),
            prefix: config.prefix.clone(),
        };

        let buckets: ListBucketsResponse = storage
            .call(
                "b2_list_buckets",
                &ListBucketsRequest {
                    account_id: &auth.account_id,
                    bucket_name: &config.bucket_name,
                },
            )
            .await?;
        storage.bucket_id = buckets
            .buckets
            .into_iter()
            .find(|b| b.bucket_name == config.bucket_name)
            .map(|b| b.bucket_id)
            .ok_or_else(|| StorageError::BucketNotFound(config.bucket_name.clone()))?;

        debug!(bucket_id = %storage.bucket_id, "authorized B2 session");
        Ok(storage)
    }

    fn object_name(&self, document: &DocumentHandle) -> String {
        format!("{}{}", self.prefix, document)
    }

    /// POST a JSON body to `<apiUrl>/b2api/v2/<operation>`.
    async fn call<Req, Resp>(&self, operation: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}/b2api/v2/{operation}", self.api_url))
            .header(AUTHORIZATION, &self.authorization_token)
            .json(body)
            .send()
            .await?;
        Ok(check(operation, response).await?.json().await?)
    }

    /// Current finalized version of a document.
    async fn object(&self, document: &DocumentHandle) -> Result<B2File> {
        let name = self.object_name(document);
        let page: ListFileNamesResponse = self
            .call(
                "b2_list_file_names",
                &ListFileNamesRequest {
                    bucket_id: &self.bucket_id,
                    prefix: &name,
                    start_file_name: Some(&name),
                    max_file_count: 1,
                },
            )
            .await?;
        page.files
            .into_iter()
            .find(|f| f.file_name == name && f.is_uploaded())
            .ok_or_else(|| StorageError::NotFound {
                document: document.clone(),
            })
    }

    async fn download(&self, document: &DocumentHandle) -> Result<Response> {
        let url = format!(
            "{}/file/{}/{}",
            self.download_url,
            self.bucket_name,
            encode_file_name(&self.object_name(document))
        );
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, &self.authorization_token)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound {
                document: document.clone(),
            });
        }
        check("download_file_by_name", response).await
    }

    async fn upload(
        &self,
        document: &DocumentHandle,
        content: Bytes,
        content_sha1: &Fingerprint,
        attrs: &MetadataAttributes,
    ) -> Result<()> {
        let target: GetUploadUrlResponse = self
            .call(
                "b2_get_upload_url",
                &GetUploadUrlRequest {
                    bucket_id: &self.bucket_id,
                },
            )
            .await?;

        let mut request = self
            .http
            .post(&target.upload_url)
            .header(AUTHORIZATION, &target.authorization_token)
            .header("X-Bz-File-Name", encode_file_name(&self.object_name(document)))
            .header(CONTENT_TYPE, CONTENT_TYPE_MARKDOWN)
            .header("X-Bz-Content-Sha1", content_sha1.as_str());
        for (key, value) in attrs.iter() {
            request = request.header(
                format!("X-Bz-Info-{key}"),
                urlencoding::encode(value).into_owned(),
            );
        }

        let response = request.body(content).send().await?;
        check("b2_upload_file", response).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageClient for B2Storage {
    fn name(&self) -> &'static str {
        "b2"
    }

    async fn list(&self) -> Result<Vec<DocumentHandle>> {
        let mut documents = Vec::new();
        let mut start: Option<String> = None;

        loop {
            let page: ListFileNamesResponse = self
                .call(
                    "b2_list_file_names",
                    &ListFileNamesRequest {
                        bucket_id: &self.bucket_id,
                        prefix: &self.prefix,
                        start_file_name: start.as_deref(),
                        max_file_count: LIST_PAGE_SIZE,
                    },
                )
                .await?;

            for file in page.files {
                if !file.is_uploaded() || !file.file_name.ends_with(DOCUMENT_EXTENSION) {
                    continue;
                }
                let name = file
                    .file_name
                    .strip_prefix(self.prefix.as_str())
                    .unwrap_or(&file.file_name);
                documents.push(DocumentHandle::from(name));
            }

            match page.next_file_name {
                Some(next) => start = Some(next),
                None => break,
            }
        }

        Ok(documents)
    }

    async fn changed(&self, document: &DocumentHandle) -> Result<bool> {
        let object = self.object(document).await?;
        let current = object.content_sha1().ok_or_else(|| {
            StorageError::InvalidResponse(format!("no content SHA-1 for '{document}'"))
        })?;
        let recorded = object.file_info.get(attributes::FINGERPRINT);
        Ok(recorded.map(String::as_str) != Some(current))
    }

    async fn read(&self, document: &DocumentHandle) -> Result<DocumentStream> {
        let response = self.download(document).await?;
        let declared_len = response.content_length().unwrap_or(0);
        let stream = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
        Ok(DocumentStream {
            reader: Box::new(StreamReader::new(stream)),
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

        let content = self.download(document).await?.bytes().await?;
        let fingerprint = attributes::ensure_unchanged(document, &content, expected)?;
        let attrs = MetadataAttributes::build(metadata, &fingerprint)?;

        self.upload(document, content, &fingerprint, &attrs).await?;
        debug!(document = %document, fingerprint = %fingerprint, "re-uploaded with attributes");
        Ok(fingerprint)
    }
}

/// Pass successful responses through; turn B2 error bodies into
/// [`StorageError::Api`].
async fn check(operation: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.json::<ApiErrorBody>().await.unwrap_or(ApiErrorBody {
        code: String::new(),
        message: String::new(),
    });
    Err(StorageError::Api {
        operation: operation.to_string(),
        status: status.as_u16(),
        code: body.code,
        message: body.message,
    })
}

/// Percent-encode an object name, keeping `/` separators.
fn encode_file_name(name: &str) -> String {
    urlencoding::encode(name).replace("%2F", "/")
}

//! Object storage
//!
//! The storage operations the SDK needs, and a client for the Cloud Storage
//! JSON API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::ResourceScope;
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::services::http::{authorize, check};

const SERVICE: &str = "storage";

/// A `gs://bucket/object` location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsUri {
    pub bucket: String,
    /// Object name or prefix, without leading or trailing slashes
    pub object: String,
}

impl GcsUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("gs://")
            .ok_or_else(|| Error::InvalidUri(uri.to_string()))?;
        let (bucket, object) = rest.split_once('/').unwrap_or((rest, ""));

        if bucket.is_empty() {
            return Err(Error::InvalidUri(uri.to_string()));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            object: object.trim_matches('/').to_string(),
        })
    }

    /// Object name of `name` below this prefix
    pub fn child(&self, name: &str) -> String {
        if self.object.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.object, name)
        }
    }
}

/// Append a path segment to a storage URI
pub fn join_uri(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

/// Object storage operations
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn bucket_exists(&self, bucket: &str, scope: &ResourceScope) -> Result<bool>;

    /// Create `bucket` in the scope's project and location
    async fn create_bucket(&self, bucket: &str, scope: &ResourceScope) -> Result<()>;

    /// Upload every file below `local_dir` to the prefix `uri`
    async fn upload_dir(
        &self,
        local_dir: &Path,
        uri: &str,
        credentials: Option<&Credentials>,
    ) -> Result<()>;

    /// Download the object at `uri` to `local_path`
    async fn download_file(
        &self,
        uri: &str,
        local_path: &Path,
        credentials: Option<&Credentials>,
    ) -> Result<()>;
}

/// Cloud Storage JSON API client
#[derive(Debug, Clone)]
pub struct GcsClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GcsClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    async fn upload_file(
        &self,
        path: &Path,
        bucket: &str,
        object: &str,
        credentials: Option<&Credentials>,
    ) -> Result<()> {
        let body = tokio::fs::read(path).await?;
        debug!("Uploading {:?} to gs://{}/{}", path, bucket, object);

        let url = format!("{}/upload/storage/v1/b/{}/o", self.endpoint, bucket);
        let request = self
            .http
            .post(url)
            .query(&[("uploadType", "media"), ("name", object)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body);

        check(SERVICE, authorize(request, credentials).send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for GcsClient {
    async fn bucket_exists(&self, bucket: &str, scope: &ResourceScope) -> Result<bool> {
        let url = format!("{}/storage/v1/b/{}", self.endpoint, bucket);
        let response = authorize(self.http.get(url), scope.credentials.as_ref())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(SERVICE, response).await?;
        Ok(true)
    }

    async fn create_bucket(&self, bucket: &str, scope: &ResourceScope) -> Result<()> {
        let url = format!("{}/storage/v1/b", self.endpoint);
        let request = self
            .http
            .post(url)
            .query(&[("project", scope.project.as_str())])
            .json(&json!({ "name": bucket, "location": scope.location }));

        check(SERVICE, authorize(request, scope.credentials.as_ref()).send().await?).await?;
        info!("Created bucket {}", bucket);
        Ok(())
    }

    async fn upload_dir(
        &self,
        local_dir: &Path,
        uri: &str,
        credentials: Option<&Credentials>,
    ) -> Result<()> {
        let destination = GcsUri::parse(uri)?;

        for entry in WalkDir::new(local_dir).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(local_dir)
                .map_err(|_| Error::InvalidUri(entry.path().display().to_string()))?;
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            self.upload_file(
                entry.path(),
                &destination.bucket,
                &destination.child(&relative),
                credentials,
            )
            .await?;
        }

        info!("Uploaded {:?} to {}", local_dir, uri);
        Ok(())
    }

    async fn download_file(
        &self,
        uri: &str,
        local_path: &Path,
        credentials: Option<&Credentials>,
    ) -> Result<()> {
        let source = GcsUri::parse(uri)?;
        let url = format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint,
            source.bucket,
            urlencoding::encode(&source.object)
        );

        let request = self.http.get(url).query(&[("alt", "media")]);
        let response = check(SERVICE, authorize(request, credentials).send().await?).await?;
        let bytes = response.bytes().await?;
        tokio::fs::write(local_path, &bytes).await?;

        debug!("Downloaded {} to {:?}", uri, local_path);
        Ok(())
    }
}

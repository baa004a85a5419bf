//! In-memory collaborators
//!
//! Fakes of the storage, metadata and model services that keep everything in
//! process and record the calls made to them.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use walkdir::WalkDir;

use crate::config::ResourceScope;
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::ml_integration::metadata::{ArtifactName, ModelArtifact};
use crate::services::{
    join_uri, MetadataContext, MetadataStore, ModelService, NewContext, ObjectStorage,
    RegisteredModel, UploadModelRequest,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn not_found(service: &'static str, what: &str) -> Error {
    Error::Api {
        service,
        status: 404,
        message: format!("{} not found", what),
    }
}

/// A call made to [`InMemoryStorage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    BucketExists(String),
    CreateBucket(String),
    UploadDir { uri: String },
    DownloadFile { uri: String },
}

/// Object storage backed by a map of `gs://` URIs to bytes
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    buckets: Mutex<BTreeSet<String>>,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    calls: Mutex<Vec<StorageCall>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(self, bucket: impl Into<String>) -> Self {
        lock(&self.buckets).insert(bucket.into());
        self
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        lock(&self.calls).clone()
    }

    pub fn buckets(&self) -> Vec<String> {
        lock(&self.buckets).iter().cloned().collect()
    }

    /// Every stored object URI
    pub fn object_uris(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    pub fn object(&self, uri: &str) -> Option<Vec<u8>> {
        lock(&self.objects).get(uri).cloned()
    }

    fn record(&self, call: StorageCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn bucket_exists(&self, bucket: &str, _scope: &ResourceScope) -> Result<bool> {
        self.record(StorageCall::BucketExists(bucket.to_string()));
        Ok(lock(&self.buckets).contains(bucket))
    }

    async fn create_bucket(&self, bucket: &str, _scope: &ResourceScope) -> Result<()> {
        self.record(StorageCall::CreateBucket(bucket.to_string()));
        lock(&self.buckets).insert(bucket.to_string());
        Ok(())
    }

    async fn upload_dir(
        &self,
        local_dir: &Path,
        uri: &str,
        _credentials: Option<&Credentials>,
    ) -> Result<()> {
        self.record(StorageCall::UploadDir {
            uri: uri.to_string(),
        });

        for entry in WalkDir::new(local_dir) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(local_dir)
                .map_err(|_| Error::InvalidUri(entry.path().display().to_string()))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let bytes = std::fs::read(entry.path())?;
            lock(&self.objects).insert(join_uri(uri, &relative), bytes);
        }
        Ok(())
    }

    async fn download_file(
        &self,
        uri: &str,
        local_path: &Path,
        _credentials: Option<&Credentials>,
    ) -> Result<()> {
        self.record(StorageCall::DownloadFile {
            uri: uri.to_string(),
        });

        let bytes = self.object(uri).ok_or_else(|| not_found("storage", uri))?;
        std::fs::write(local_path, bytes)?;
        Ok(())
    }
}

/// Metadata store keeping artifacts and contexts in memory
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    artifacts: Mutex<BTreeMap<String, ModelArtifact>>,
    contexts: Mutex<BTreeMap<String, MetadataContext>>,
    children: Mutex<BTreeMap<String, Vec<String>>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> Vec<ModelArtifact> {
        lock(&self.artifacts).values().cloned().collect()
    }

    pub fn contexts(&self) -> Vec<MetadataContext> {
        lock(&self.contexts).values().cloned().collect()
    }

    pub fn children(&self, context_name: &str) -> Vec<String> {
        lock(&self.children)
            .get(context_name)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn create_artifact(
        &self,
        scope: &ResourceScope,
        metadata_store_id: &str,
        artifact: &ModelArtifact,
    ) -> Result<ModelArtifact> {
        let artifact_id = artifact
            .artifact_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let name = ArtifactName {
            project: scope.project.clone(),
            location: scope.location.clone(),
            metadata_store_id: metadata_store_id.to_string(),
            artifact_id: artifact_id.clone(),
        }
        .to_string();

        let mut artifacts = lock(&self.artifacts);
        if artifacts.contains_key(&name) {
            return Err(Error::Api {
                service: "metadata",
                status: 409,
                message: format!("{} already exists", name),
            });
        }

        let stored = ModelArtifact {
            artifact_id: Some(artifact_id),
            resource_name: Some(name.clone()),
            project: Some(scope.project.clone()),
            location: Some(scope.location.clone()),
            credentials: scope.credentials.clone(),
            ..artifact.clone()
        };
        artifacts.insert(name, stored.clone());
        Ok(stored)
    }

    async fn get_artifact(
        &self,
        name: &ArtifactName,
        credentials: Option<&Credentials>,
    ) -> Result<ModelArtifact> {
        let name = name.to_string();
        let artifact = lock(&self.artifacts)
            .get(&name)
            .cloned()
            .ok_or_else(|| not_found("metadata", &name))?;

        Ok(ModelArtifact {
            credentials: credentials.cloned(),
            ..artifact
        })
    }

    async fn get_or_create_context(
        &self,
        scope: &ResourceScope,
        metadata_store_id: &str,
        context: &NewContext,
    ) -> Result<MetadataContext> {
        let name = format!(
            "{}/metadataStores/{}/contexts/{}",
            scope.parent(),
            metadata_store_id,
            context.context_id
        );

        let stored = lock(&self.contexts)
            .entry(name.clone())
            .or_insert_with(|| MetadataContext {
                name,
                display_name: context.display_name.clone(),
                schema_title: context.schema_title.clone(),
                metadata: context.metadata.clone(),
            })
            .clone();
        Ok(stored)
    }

    async fn create_context(
        &self,
        scope: &ResourceScope,
        metadata_store_id: &str,
        context: &NewContext,
    ) -> Result<MetadataContext> {
        let name = format!(
            "{}/metadataStores/{}/contexts/{}",
            scope.parent(),
            metadata_store_id,
            context.context_id
        );

        let mut contexts = lock(&self.contexts);
        if contexts.contains_key(&name) {
            return Err(Error::Api {
                service: "metadata",
                status: 409,
                message: format!("{} already exists", name),
            });
        }

        let created = MetadataContext {
            name: name.clone(),
            display_name: context.display_name.clone(),
            schema_title: context.schema_title.clone(),
            metadata: context.metadata.clone(),
        };
        contexts.insert(name, created.clone());
        Ok(created)
    }

    async fn add_context_children(
        &self,
        _scope: &ResourceScope,
        context_name: &str,
        children: &[String],
    ) -> Result<()> {
        if !lock(&self.contexts).contains_key(context_name) {
            return Err(not_found("metadata", context_name));
        }
        lock(&self.children)
            .entry(context_name.to_string())
            .or_default()
            .extend(children.iter().cloned());
        Ok(())
    }
}

/// Model service that records uploads and completes them at once
#[derive(Debug, Default)]
pub struct RecordingModelService {
    uploads: Mutex<Vec<(ResourceScope, UploadModelRequest)>>,
}

impl RecordingModelService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every upload received, with the scope it ran under
    pub fn uploads(&self) -> Vec<(ResourceScope, UploadModelRequest)> {
        lock(&self.uploads).clone()
    }
}

#[async_trait]
impl ModelService for RecordingModelService {
    async fn upload_model(
        &self,
        scope: &ResourceScope,
        request: UploadModelRequest,
    ) -> Result<RegisteredModel> {
        let mut uploads = lock(&self.uploads);
        let resource_name = format!("{}/models/{}", scope.parent(), uploads.len() + 1);

        let model = RegisteredModel {
            operation_name: format!("{}/operations/1", resource_name),
            resource_name: request.sync.then(|| resource_name.clone()),
            version_id: request.sync.then(|| "1".to_string()),
            display_name: request.display_name.clone(),
            done: request.sync,
        };
        uploads.push((scope.clone(), request));
        Ok(model)
    }

    async fn wait(&self, _scope: &ResourceScope, model: RegisteredModel) -> Result<RegisteredModel> {
        let resource_name = model
            .operation_name
            .split("/operations/")
            .next()
            .map(str::to_string);

        Ok(RegisteredModel {
            resource_name,
            version_id: Some("1".to_string()),
            done: true,
            ..model
        })
    }
}

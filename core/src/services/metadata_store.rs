//! Metadata store
//!
//! Artifacts and contexts in the Vertex AI metadata service.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::config::{api_base_url, ResourceScope};
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::ml_integration::metadata::{
    ArtifactName, ExperimentModelMetadata, ModelArtifact, EXPERIMENT_MODEL_SCHEMA_TITLE,
    EXPERIMENT_MODEL_SCHEMA_VERSION,
};
use crate::services::http::{authorize, check};

const SERVICE: &str = "metadata";

/// A context to look up, or create when absent
#[derive(Debug, Clone, PartialEq)]
pub struct NewContext {
    pub context_id: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub schema_title: String,
    pub schema_version: String,
    pub metadata: Map<String, Value>,
}

/// A context as stored in the metadata service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataContext {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub schema_title: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Metadata service operations
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Create `artifact` and return the stored record
    async fn create_artifact(
        &self,
        scope: &ResourceScope,
        metadata_store_id: &str,
        artifact: &ModelArtifact,
    ) -> Result<ModelArtifact>;

    async fn get_artifact(
        &self,
        name: &ArtifactName,
        credentials: Option<&Credentials>,
    ) -> Result<ModelArtifact>;

    async fn get_or_create_context(
        &self,
        scope: &ResourceScope,
        metadata_store_id: &str,
        context: &NewContext,
    ) -> Result<MetadataContext>;

    /// Create `context`; an existing context id fails with a 409 [`Error::Api`]
    async fn create_context(
        &self,
        scope: &ResourceScope,
        metadata_store_id: &str,
        context: &NewContext,
    ) -> Result<MetadataContext>;

    /// Link `children` (context resource names) below `context_name`
    async fn add_context_children(
        &self,
        scope: &ResourceScope,
        context_name: &str,
        children: &[String],
    ) -> Result<()>;
}

/// Artifact resource as exchanged with the REST API
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    schema_title: String,
    #[serde(default)]
    schema_version: String,
    #[serde(default)]
    metadata: ExperimentModelMetadata,
}

impl ArtifactResource {
    fn from_artifact(artifact: &ModelArtifact) -> Self {
        Self {
            name: None,
            display_name: artifact.display_name.clone(),
            uri: artifact.uri.clone(),
            schema_title: EXPERIMENT_MODEL_SCHEMA_TITLE.to_string(),
            schema_version: EXPERIMENT_MODEL_SCHEMA_VERSION.to_string(),
            metadata: artifact.metadata(),
        }
    }

    fn into_artifact(self, credentials: Option<Credentials>) -> Result<ModelArtifact> {
        let name = self
            .name
            .ok_or_else(|| Error::InvalidResourceName("artifact without a name".to_string()))?;
        if self.schema_title != EXPERIMENT_MODEL_SCHEMA_TITLE {
            return Err(Error::OperationFailed {
                operation: "get_artifact".to_string(),
                message: format!(
                    "{} has schema {} instead of {}",
                    name, self.schema_title, EXPERIMENT_MODEL_SCHEMA_TITLE
                ),
            });
        }
        let parsed = ArtifactName::parse(&name)?;

        Ok(ModelArtifact {
            artifact_id: Some(parsed.artifact_id),
            resource_name: Some(name),
            display_name: self.display_name,
            uri: self.uri,
            framework_name: self.metadata.framework_name,
            framework_version: self.metadata.framework_version,
            model_file: self.metadata.model_file,
            model_class: self.metadata.model_class,
            predict_schemata: self.metadata.predict_schemata,
            project: Some(parsed.project),
            location: Some(parsed.location),
            credentials,
        })
    }
}

/// Vertex AI v1 metadata REST client
#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
    api_endpoint: Option<String>,
}

impl MetadataClient {
    /// `api_endpoint` overrides the regional `aiplatform` endpoint
    pub fn new(api_endpoint: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_endpoint)
    }

    pub fn with_client(http: reqwest::Client, api_endpoint: Option<String>) -> Self {
        Self { http, api_endpoint }
    }

    fn url(&self, location: &str, path: &str) -> String {
        format!(
            "{}/v1/{}",
            api_base_url(self.api_endpoint.as_deref(), location),
            path
        )
    }

    fn store_path(scope: &ResourceScope, metadata_store_id: &str) -> String {
        format!("{}/metadataStores/{}", scope.parent(), metadata_store_id)
    }
}

#[async_trait]
impl MetadataStore for MetadataClient {
    async fn create_artifact(
        &self,
        scope: &ResourceScope,
        metadata_store_id: &str,
        artifact: &ModelArtifact,
    ) -> Result<ModelArtifact> {
        let url = self.url(
            &scope.location,
            &format!("{}/artifacts", Self::store_path(scope, metadata_store_id)),
        );

        let mut request = self.http.post(url);
        if let Some(id) = &artifact.artifact_id {
            request = request.query(&[("artifactId", id.as_str())]);
        }
        let request = request.json(&ArtifactResource::from_artifact(artifact));

        let response = check(SERVICE, authorize(request, scope.credentials.as_ref()).send().await?).await?;
        let created: ArtifactResource = response.json().await?;
        let created = created.into_artifact(scope.credentials.clone())?;

        info!(
            "Created model artifact {}",
            created.resource_name.as_deref().unwrap_or_default()
        );
        Ok(created)
    }

    async fn get_artifact(
        &self,
        name: &ArtifactName,
        credentials: Option<&Credentials>,
    ) -> Result<ModelArtifact> {
        let url = self.url(&name.location, &name.to_string());
        debug!("Fetching artifact {}", name);

        let response = check(SERVICE, authorize(self.http.get(url), credentials).send().await?).await?;
        let resource: ArtifactResource = response.json().await?;
        resource.into_artifact(credentials.cloned())
    }

    async fn get_or_create_context(
        &self,
        scope: &ResourceScope,
        metadata_store_id: &str,
        context: &NewContext,
    ) -> Result<MetadataContext> {
        let url = self.url(
            &scope.location,
            &format!(
                "{}/contexts/{}",
                Self::store_path(scope, metadata_store_id),
                context.context_id
            ),
        );
        let response = authorize(self.http.get(url), scope.credentials.as_ref())
            .send()
            .await?;
        if response.status() != StatusCode::NOT_FOUND {
            let response = check(SERVICE, response).await?;
            return Ok(response.json().await?);
        }

        self.create_context(scope, metadata_store_id, context).await
    }

    async fn create_context(
        &self,
        scope: &ResourceScope,
        metadata_store_id: &str,
        context: &NewContext,
    ) -> Result<MetadataContext> {
        let contexts = format!("{}/contexts", Self::store_path(scope, metadata_store_id));

        let mut body = json!({
            "schemaTitle": context.schema_title,
            "schemaVersion": context.schema_version,
            "metadata": context.metadata,
        });
        if let Some(display_name) = &context.display_name {
            body["displayName"] = json!(display_name);
        }
        if let Some(description) = &context.description {
            body["description"] = json!(description);
        }

        let request = self
            .http
            .post(self.url(&scope.location, &contexts))
            .query(&[("contextId", context.context_id.as_str())])
            .json(&body);
        let response = check(
            SERVICE,
            authorize(request, scope.credentials.as_ref()).send().await?,
        )
        .await?;
        let created: MetadataContext = response.json().await?;

        info!("Created {} context {}", context.schema_title, created.name);
        Ok(created)
    }

    async fn add_context_children(
        &self,
        scope: &ResourceScope,
        context_name: &str,
        children: &[String],
    ) -> Result<()> {
        let url = self.url(
            &scope.location,
            &format!("{}:addContextChildren", context_name),
        );
        let request = self.http.post(url).json(&json!({ "childContexts": children }));

        check(SERVICE, authorize(request, scope.credentials.as_ref()).send().await?).await?;
        debug!("Added {} child context(s) to {}", children.len(), context_name);
        Ok(())
    }
}

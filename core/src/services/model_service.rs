//! Model registry service
//!
//! Uploads models to the Vertex AI Model Registry and follows the resulting
//! long-running operation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{api_base_url, ResourceScope};
use crate::error::{Error, Result};
use crate::naming::timestamped_unique_name;
use crate::services::http::{authorize, check};
use crate::services::storage::{join_uri, ObjectStorage};

const SERVICE: &str = "model";

/// Alias carried by the default version of a model
pub const DEFAULT_VERSION_ALIAS: &str = "default";

/// Interval between polls of a pending upload
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Serving container of an uploaded model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServingContainer {
    pub image_uri: String,
    pub predict_route: Option<String>,
    pub health_route: Option<String>,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub ports: Vec<u16>,
}

/// A model upload as sent to the registry
#[derive(Debug, Clone, PartialEq)]
pub struct UploadModelRequest {
    pub display_name: String,
    pub description: Option<String>,
    /// Directory holding the model files; local paths are staged first
    pub artifact_uri: Option<String>,
    pub serving_container: ServingContainer,
    pub instance_schema_uri: Option<String>,
    pub parameters_schema_uri: Option<String>,
    pub prediction_schema_uri: Option<String>,
    pub explanation_metadata: Option<Value>,
    pub explanation_parameters: Option<Value>,
    pub labels: BTreeMap<String, String>,
    pub model_id: Option<String>,
    /// Registers the upload as a new version of this model
    pub parent_model: Option<String>,
    pub is_default_version: bool,
    pub version_aliases: Vec<String>,
    pub version_description: Option<String>,
    pub encryption_spec_key_name: Option<String>,
    pub staging_bucket: Option<String>,
    /// Wait for the upload to finish before returning
    pub sync: bool,
    /// HTTP timeout of the upload call
    pub upload_request_timeout: Option<Duration>,
}

/// Outcome of a model upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredModel {
    /// Long-running operation tracking the upload
    pub operation_name: String,
    /// `projects/{p}/locations/{l}/models/{id}` once the upload is done
    pub resource_name: Option<String>,
    pub version_id: Option<String>,
    pub display_name: String,
    pub done: bool,
}

/// Model registry operations
#[async_trait]
pub trait ModelService: Send + Sync {
    async fn upload_model(
        &self,
        scope: &ResourceScope,
        request: UploadModelRequest,
    ) -> Result<RegisteredModel>;

    /// Block until a pending upload completes
    async fn wait(&self, scope: &ResourceScope, model: RegisteredModel) -> Result<RegisteredModel>;
}

/// Apply the default-version rule to the requested aliases
pub fn version_aliases(aliases: &[String], is_default_version: bool) -> Vec<String> {
    let mut aliases = aliases.to_vec();
    if is_default_version && !aliases.iter().any(|alias| alias == DEFAULT_VERSION_ALIAS) {
        aliases.push(DEFAULT_VERSION_ALIAS.to_string());
    }
    aliases
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadModelBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_model: Option<String>,
    model: ModelBody,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelBody {
    display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    version_aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact_uri: Option<String>,
    container_spec: ContainerSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    predict_schemata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation_spec: Option<Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encryption_spec: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContainerSpec {
    image_uri: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    command: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    args: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env: Vec<EnvVar>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<Port>,
    #[serde(skip_serializing_if = "Option::is_none")]
    predict_route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    health_route: Option<String>,
}

#[derive(Serialize)]
struct EnvVar {
    name: String,
    value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Port {
    container_port: u16,
}

impl UploadModelBody {
    fn new(request: UploadModelRequest, artifact_uri: Option<String>) -> Self {
        let container = request.serving_container;
        let schemata: serde_json::Map<String, Value> = [
            ("instanceSchemaUri", request.instance_schema_uri),
            ("parametersSchemaUri", request.parameters_schema_uri),
            ("predictionSchemaUri", request.prediction_schema_uri),
        ]
        .into_iter()
        .filter_map(|(key, uri)| uri.map(|uri| (key.to_string(), Value::String(uri))))
        .collect();

        let explanation_spec = match (request.explanation_metadata, request.explanation_parameters) {
            (None, None) => None,
            (metadata, parameters) => {
                let mut spec = serde_json::Map::new();
                if let Some(metadata) = metadata {
                    spec.insert("metadata".to_string(), metadata);
                }
                if let Some(parameters) = parameters {
                    spec.insert("parameters".to_string(), parameters);
                }
                Some(Value::Object(spec))
            }
        };

        Self {
            model_id: request.model_id,
            parent_model: request.parent_model,
            model: ModelBody {
                display_name: request.display_name,
                description: request.description,
                version_aliases: version_aliases(&request.version_aliases, request.is_default_version),
                version_description: request.version_description,
                artifact_uri,
                container_spec: ContainerSpec {
                    image_uri: container.image_uri,
                    command: container.command,
                    args: container.args,
                    env: container
                        .env
                        .into_iter()
                        .map(|(name, value)| EnvVar { name, value })
                        .collect(),
                    ports: container
                        .ports
                        .into_iter()
                        .map(|container_port| Port { container_port })
                        .collect(),
                    predict_route: container.predict_route,
                    health_route: container.health_route,
                },
                predict_schemata: (!schemata.is_empty()).then(|| Value::Object(schemata)),
                explanation_spec,
                labels: request.labels,
                encryption_spec: request
                    .encryption_spec_key_name
                    .map(|key| serde_json::json!({ "kmsKeyName": key })),
            },
        }
    }
}

/// Long-running operation as returned by the API
#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    response: Option<UploadModelResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadModelResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    model_version_id: Option<String>,
}

impl Operation {
    fn into_registered(self, display_name: String) -> Result<RegisteredModel> {
        if let Some(error) = self.error {
            return Err(Error::OperationFailed {
                operation: self.name,
                message: error.message,
            });
        }

        let response = self.response.unwrap_or(UploadModelResponse {
            model: None,
            model_version_id: None,
        });
        Ok(RegisteredModel {
            operation_name: self.name,
            resource_name: response.model,
            version_id: response.model_version_id,
            display_name,
            done: self.done,
        })
    }
}

/// Vertex AI v1 model service REST client
#[derive(Clone)]
pub struct ModelServiceClient {
    http: reqwest::Client,
    api_endpoint: Option<String>,
    storage: Arc<dyn ObjectStorage>,
    poll_interval: Duration,
}

impl ModelServiceClient {
    /// `storage` stages local artifact directories before upload
    pub fn new(api_endpoint: Option<String>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_endpoint,
            storage,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn url(&self, location: &str, path: &str) -> String {
        format!(
            "{}/v1/{}",
            api_base_url(self.api_endpoint.as_deref(), location),
            path
        )
    }

    /// Copy a local artifact directory below the staging bucket
    async fn stage_artifacts(
        &self,
        scope: &ResourceScope,
        local_dir: &str,
        staging_bucket: Option<&str>,
    ) -> Result<String> {
        let staging_bucket = staging_bucket.ok_or(Error::MissingConfig("staging_bucket"))?;
        let destination = join_uri(
            staging_bucket,
            &format!("vertex_ai_auto_staging/{}", timestamped_unique_name()),
        );

        info!("Staging {} at {}", local_dir, destination);
        self.storage
            .upload_dir(Path::new(local_dir), &destination, scope.credentials.as_ref())
            .await?;
        Ok(destination)
    }
}

#[async_trait]
impl ModelService for ModelServiceClient {
    async fn upload_model(
        &self,
        scope: &ResourceScope,
        request: UploadModelRequest,
    ) -> Result<RegisteredModel> {
        let artifact_uri = match request.artifact_uri.as_deref() {
            Some(uri) if !uri.starts_with("gs://") => Some(
                self.stage_artifacts(scope, uri, request.staging_bucket.as_deref())
                    .await?,
            ),
            other => other.map(str::to_string),
        };

        let sync = request.sync;
        let timeout = request.upload_request_timeout;
        let display_name = request.display_name.clone();
        let body = UploadModelBody::new(request, artifact_uri);

        let url = self.url(&scope.location, &format!("{}/models:upload", scope.parent()));
        let mut http_request = self.http.post(url).json(&body);
        if let Some(timeout) = timeout {
            http_request = http_request.timeout(timeout);
        }

        let response = check(
            SERVICE,
            authorize(http_request, scope.credentials.as_ref()).send().await?,
        )
        .await?;
        let operation: Operation = response.json().await?;
        info!("Model upload started: {}", operation.name);

        let model = operation.into_registered(display_name)?;
        if sync && !model.done {
            return self.wait(scope, model).await;
        }
        Ok(model)
    }

    async fn wait(&self, scope: &ResourceScope, model: RegisteredModel) -> Result<RegisteredModel> {
        let mut model = model;
        while !model.done {
            tokio::time::sleep(self.poll_interval).await;

            let url = self.url(&scope.location, &model.operation_name);
            let response = check(
                SERVICE,
                authorize(self.http.get(url), scope.credentials.as_ref())
                    .send()
                    .await?,
            )
            .await?;
            let operation: Operation = response.json().await?;
            debug!("Polled {}: done={}", operation.name, operation.done);
            model = operation.into_registered(model.display_name)?;
        }

        info!(
            "Model registered: {}",
            model.resource_name.as_deref().unwrap_or_default()
        );
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{InMemoryStorage, StorageCall};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OPERATION: &str = "projects/proj/locations/us-central1/models/123/operations/456";
    const UPLOAD_PATH: &str = "/v1/projects/proj/locations/us-central1/models:upload";

    fn scope() -> ResourceScope {
        ResourceScope {
            project: "proj".to_string(),
            location: "us-central1".to_string(),
            credentials: None,
        }
    }

    fn request() -> UploadModelRequest {
        UploadModelRequest {
            display_name: "sklearn model".to_string(),
            description: None,
            artifact_uri: Some("gs://bucket/run".to_string()),
            serving_container: ServingContainer {
                image_uri: "us-docker.pkg.dev/vertex-ai/prediction/sklearn-cpu.1-3:latest"
                    .to_string(),
                ..Default::default()
            },
            instance_schema_uri: None,
            parameters_schema_uri: None,
            prediction_schema_uri: None,
            explanation_metadata: None,
            explanation_parameters: None,
            labels: BTreeMap::new(),
            model_id: None,
            parent_model: None,
            is_default_version: true,
            version_aliases: Vec::new(),
            version_description: None,
            encryption_spec_key_name: None,
            staging_bucket: None,
            sync: true,
            upload_request_timeout: None,
        }
    }

    fn done_operation() -> Value {
        json!({
            "name": OPERATION,
            "done": true,
            "response": {
                "model": "projects/proj/locations/us-central1/models/123",
                "modelVersionId": "1"
            }
        })
    }

    fn client(server: &MockServer, storage: Arc<InMemoryStorage>) -> ModelServiceClient {
        ModelServiceClient::new(Some(server.uri()), storage)
            .with_poll_interval(Duration::from_millis(10))
    }

    #[test]
    fn test_version_aliases() {
        assert_eq!(version_aliases(&[], true), vec!["default"]);
        assert_eq!(
            version_aliases(&["prod".to_string()], true),
            vec!["prod", "default"]
        );
        assert_eq!(
            version_aliases(&["default".to_string()], true),
            vec!["default"]
        );
        assert!(version_aliases(&[], false).is_empty());
    }

    #[tokio::test]
    async fn test_upload_completes_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(UPLOAD_PATH))
            .and(body_partial_json(json!({
                "model": {
                    "displayName": "sklearn model",
                    "artifactUri": "gs://bucket/run",
                    "versionAliases": ["default"],
                    "containerSpec": {
                        "imageUri": "us-docker.pkg.dev/vertex-ai/prediction/sklearn-cpu.1-3:latest"
                    }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(done_operation()))
            .expect(1)
            .mount(&server)
            .await;

        let model = client(&server, Arc::new(InMemoryStorage::new()))
            .upload_model(&scope(), request())
            .await
            .unwrap();

        assert!(model.done);
        assert_eq!(
            model.resource_name.as_deref(),
            Some("projects/proj/locations/us-central1/models/123")
        );
        assert_eq!(model.version_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_sync_upload_polls_operation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(UPLOAD_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": OPERATION})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{}", OPERATION)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": OPERATION})))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/{}", OPERATION)))
            .respond_with(ResponseTemplate::new(200).set_body_json(done_operation()))
            .mount(&server)
            .await;

        let model = client(&server, Arc::new(InMemoryStorage::new()))
            .upload_model(&scope(), request())
            .await
            .unwrap();
        assert!(model.done);
        assert_eq!(model.display_name, "sklearn model");
    }

    #[tokio::test]
    async fn test_async_upload_returns_pending_operation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(UPLOAD_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": OPERATION})))
            .mount(&server)
            .await;

        let model = client(&server, Arc::new(InMemoryStorage::new()))
            .upload_model(
                &scope(),
                UploadModelRequest {
                    sync: false,
                    ..request()
                },
            )
            .await
            .unwrap();
        assert!(!model.done);
        assert_eq!(model.operation_name, OPERATION);
        assert_eq!(model.resource_name, None);
    }

    #[tokio::test]
    async fn test_failed_operation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(UPLOAD_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": OPERATION,
                "done": true,
                "error": {"code": 3, "message": "Invalid container image"}
            })))
            .mount(&server)
            .await;

        let err = client(&server, Arc::new(InMemoryStorage::new()))
            .upload_model(&scope(), request())
            .await
            .unwrap_err();
        match err {
            Error::OperationFailed { operation, message } => {
                assert_eq!(operation, OPERATION);
                assert_eq!(message, "Invalid container image");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_local_artifacts_are_staged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(UPLOAD_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(done_operation()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.pkl"), b"bytes").unwrap();

        let storage = Arc::new(InMemoryStorage::new());
        client(&server, storage.clone())
            .upload_model(
                &scope(),
                UploadModelRequest {
                    artifact_uri: Some(dir.path().display().to_string()),
                    staging_bucket: Some("gs://staging".to_string()),
                    ..request()
                },
            )
            .await
            .unwrap();

        let calls = storage.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            &calls[0],
            StorageCall::UploadDir { uri } if uri.starts_with("gs://staging/vertex_ai_auto_staging/")
        ));
    }

    #[tokio::test]
    async fn test_local_artifacts_need_staging_bucket() {
        let server = MockServer::start().await;
        let err = client(&server, Arc::new(InMemoryStorage::new()))
            .upload_model(
                &scope(),
                UploadModelRequest {
                    artifact_uri: Some("/tmp/model".to_string()),
                    ..request()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingConfig("staging_bucket")));
    }
}

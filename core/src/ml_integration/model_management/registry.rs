//! Model Registry
//!
//! Registers saved-model artifacts as deployable models in the Vertex AI
//! Model Registry.

use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

use super::ModelClient;
use crate::credentials::Credentials;
use crate::error::Result;
use crate::initializer::SdkConfig;
use crate::ml_integration::metadata::ModelRef;
use crate::naming::generate_display_name;
use crate::services::{Accelerator, RegisteredModel, ServingContainer, UploadModelRequest};

/// Optional arguments of [`ModelClient::register_model`]
#[derive(Debug, Clone)]
pub struct RegisterModelOptions {
    pub model_id: Option<String>,
    /// Register as a new version of this model
    pub parent_model: Option<String>,
    /// Serve on GPU when the framework has a GPU image
    pub use_gpu: bool,
    pub is_default_version: bool,
    pub version_aliases: Vec<String>,
    pub version_description: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub labels: BTreeMap<String, String>,
    /// Defaults to the closest pre-built image for the framework version
    pub serving_container_image_uri: Option<String>,
    pub serving_container_predict_route: Option<String>,
    pub serving_container_health_route: Option<String>,
    pub serving_container_command: Vec<String>,
    pub serving_container_args: Vec<String>,
    pub serving_container_environment_variables: BTreeMap<String, String>,
    pub serving_container_ports: Vec<u16>,
    pub instance_schema_uri: Option<String>,
    pub parameters_schema_uri: Option<String>,
    pub prediction_schema_uri: Option<String>,
    pub explanation_metadata: Option<Value>,
    pub explanation_parameters: Option<Value>,
    pub project: Option<String>,
    pub location: Option<String>,
    pub credentials: Option<Credentials>,
    pub encryption_spec_key_name: Option<String>,
    pub staging_bucket: Option<String>,
    /// Wait for the upload to finish
    pub sync: bool,
    pub upload_request_timeout: Option<Duration>,
}

impl Default for RegisterModelOptions {
    fn default() -> Self {
        Self {
            model_id: None,
            parent_model: None,
            use_gpu: false,
            is_default_version: true,
            version_aliases: Vec::new(),
            version_description: None,
            display_name: None,
            description: None,
            labels: BTreeMap::new(),
            serving_container_image_uri: None,
            serving_container_predict_route: None,
            serving_container_health_route: None,
            serving_container_command: Vec::new(),
            serving_container_args: Vec::new(),
            serving_container_environment_variables: BTreeMap::new(),
            serving_container_ports: Vec::new(),
            instance_schema_uri: None,
            parameters_schema_uri: None,
            prediction_schema_uri: None,
            explanation_metadata: None,
            explanation_parameters: None,
            project: None,
            location: None,
            credentials: None,
            encryption_spec_key_name: None,
            staging_bucket: None,
            sync: true,
            upload_request_timeout: None,
        }
    }
}

/// Accelerator of the pre-built serving image
///
/// Only tensorflow has GPU images. Artifacts saved by this crate are always
/// sklearn, so the GPU branch is reached only through externally created
/// artifacts.
pub fn serving_accelerator(framework_name: &str, use_gpu: bool) -> Accelerator {
    if framework_name == "tensorflow" && use_gpu {
        Accelerator::Gpu
    } else {
        Accelerator::Cpu
    }
}

impl ModelClient {
    /// Upload a saved model to the model registry
    ///
    /// Project, location and credentials default to those of the artifact,
    /// then to the global config.
    pub async fn register_model(
        &self,
        config: &SdkConfig,
        model: impl Into<ModelRef>,
        options: RegisterModelOptions,
    ) -> Result<RegisteredModel> {
        let artifact = self.resolve_artifact(config, model.into()).await?;

        let scope = config.resolve_scope(
            options.project.or_else(|| artifact.project.clone()),
            options.location.or_else(|| artifact.location.clone()),
            options.credentials.or_else(|| artifact.credentials.clone()),
        )?;

        let image_uri = match options.serving_container_image_uri {
            Some(uri) => uri,
            None => self.containers.closest_match(
                &artifact.framework_name,
                &artifact.framework_version,
                &scope.location,
                serving_accelerator(&artifact.framework_name, options.use_gpu),
            )?,
        };

        let display_name = options
            .display_name
            .unwrap_or_else(|| generate_display_name(&format!("{} model", artifact.framework_name)));

        let request = UploadModelRequest {
            display_name,
            description: options.description,
            artifact_uri: Some(artifact.uri.clone()),
            serving_container: ServingContainer {
                image_uri,
                predict_route: options.serving_container_predict_route,
                health_route: options.serving_container_health_route,
                command: options.serving_container_command,
                args: options.serving_container_args,
                env: options.serving_container_environment_variables,
                ports: options.serving_container_ports,
            },
            instance_schema_uri: options.instance_schema_uri,
            parameters_schema_uri: options.parameters_schema_uri,
            prediction_schema_uri: options.prediction_schema_uri,
            explanation_metadata: options.explanation_metadata,
            explanation_parameters: options.explanation_parameters,
            labels: options.labels,
            model_id: options.model_id,
            parent_model: options.parent_model,
            is_default_version: options.is_default_version,
            version_aliases: options.version_aliases,
            version_description: options.version_description,
            encryption_spec_key_name: options
                .encryption_spec_key_name
                .or_else(|| config.encryption_spec_key_name.clone()),
            staging_bucket: options
                .staging_bucket
                .or_else(|| config.staging_bucket.clone()),
            sync: options.sync,
            upload_request_timeout: options.upload_request_timeout,
        };

        info!(
            "Registering {} model from {} in {}",
            artifact.framework_name,
            artifact.uri,
            scope.parent()
        );
        self.models.upload_model(&scope, request).await
    }
}

//! Model Exporter
//!
//! Saves a trained model to object storage and records it as an
//! ExperimentModel artifact.

use std::path::Path;
use tracing::{debug, info};

use super::input_example::{save_input_example, InputExample, INPUT_EXAMPLE_FILE};
use super::ModelClient;
use crate::config::{GlobalConfig, ResourceScope};
use crate::credentials::Credentials;
use crate::error::Result;
use crate::initializer::SdkConfig;
use crate::ml_integration::frameworks::{Framework, Model};
use crate::ml_integration::metadata::{ModelArtifact, PredictSchemata};
use crate::naming::{staging_bucket_name, timestamped_unique_name};
use crate::services::join_uri;

/// Optional arguments of [`ModelClient::save_model`]
#[derive(Debug, Clone, Default)]
pub struct SaveModelOptions {
    /// Artifact id; the metadata service assigns one when unset
    pub artifact_id: Option<String>,
    /// Destination directory; defaults to a unique path in the staging bucket
    pub uri: Option<String>,
    /// Sample of model input, stored next to the model as `instance.yaml`
    pub input_example: Option<InputExample>,
    pub display_name: Option<String>,
    /// Defaults to the configured metadata store
    pub metadata_store_id: Option<String>,
    pub project: Option<String>,
    pub location: Option<String>,
    pub credentials: Option<Credentials>,
}

impl ModelClient {
    /// Save `model` and create its ExperimentModel artifact
    ///
    /// Every call without an explicit `artifact_id` creates a new artifact.
    pub async fn save_model<M: Model>(
        &self,
        config: &SdkConfig,
        model: &M,
        options: SaveModelOptions,
    ) -> Result<ModelArtifact> {
        let framework = Framework::detect(model)?;
        let scope = config.resolve_scope(options.project, options.location, options.credentials)?;

        let uri = match options.uri {
            Some(uri) => uri,
            None => {
                let staging_bucket = self.staging_bucket(config, &scope).await?;
                join_uri(
                    &staging_bucket,
                    &format!("{}-{}-model", timestamped_unique_name(), framework),
                )
            }
        };

        let predict_schemata = self
            .write_and_upload(framework, model, options.input_example.as_ref(), &uri, &scope)
            .await?;

        let artifact = ModelArtifact {
            artifact_id: options.artifact_id,
            resource_name: None,
            display_name: options.display_name,
            uri,
            framework_name: framework.name().to_string(),
            framework_version: model.framework_version(),
            model_file: framework.model_file().to_string(),
            model_class: model.model_class(),
            predict_schemata,
            project: None,
            location: None,
            credentials: None,
        };

        let metadata_store_id = options
            .metadata_store_id
            .unwrap_or_else(|| config.metadata_store_id.clone());
        let artifact = self
            .metadata
            .create_artifact(&scope, &metadata_store_id, &artifact)
            .await?;

        info!(
            "Saved {} model {} to {}",
            framework,
            artifact.model_class,
            artifact.uri
        );
        Ok(artifact)
    }

    /// Configured staging bucket, or the per-project one created on first use
    async fn staging_bucket(&self, config: &GlobalConfig, scope: &ResourceScope) -> Result<String> {
        if let Some(bucket) = &config.staging_bucket {
            return Ok(bucket.clone());
        }

        let name = staging_bucket_name(&scope.project, &scope.location);
        if !self.storage.bucket_exists(&name, scope).await? {
            info!("Creating staging bucket \"{}\"", name);
            self.storage.create_bucket(&name, scope).await?;
        }
        Ok(format!("gs://{}", name))
    }

    /// Write the model (and input example) to a temp dir and upload it to `uri`
    ///
    /// The temp dir is removed when this returns, on success or failure.
    async fn write_and_upload<M: Model>(
        &self,
        framework: Framework,
        model: &M,
        input_example: Option<&InputExample>,
        uri: &str,
        scope: &ResourceScope,
    ) -> Result<Option<PredictSchemata>> {
        let temp_dir = tempfile::tempdir()?;
        let dir: &Path = temp_dir.path();

        framework.save(model, &dir.join(framework.model_file()))?;

        let predict_schemata = match input_example {
            Some(example) => {
                save_input_example(example, dir)?;
                Some(PredictSchemata {
                    instance_schema_uri: Some(join_uri(uri, INPUT_EXAMPLE_FILE)),
                    ..Default::default()
                })
            }
            None => None,
        };

        debug!("Uploading {:?} to {}", dir, uri);
        self.storage
            .upload_dir(dir, uri, scope.credentials.as_ref())
            .await?;

        Ok(predict_schemata)
    }
}

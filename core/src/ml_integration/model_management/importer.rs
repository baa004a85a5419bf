//! Model Importer
//!
//! Resolves saved-model artifacts and loads the models they describe.

use tracing::{debug, info};

use super::ModelClient;
use crate::config::GlobalConfig;
use crate::error::{Error, Result};
use crate::initializer::SdkConfig;
use crate::ml_integration::frameworks::{Framework, Model};
use crate::ml_integration::metadata::{ArtifactName, ModelArtifact, ModelRef};
use crate::services::join_uri;

impl ModelClient {
    /// Fetch an ExperimentModel artifact by id or full resource name
    pub async fn get_model_artifact(
        &self,
        config: &GlobalConfig,
        id_or_name: &str,
    ) -> Result<ModelArtifact> {
        let name = ArtifactName::resolve(id_or_name, config)?;
        debug!("Resolving model artifact {}", name);
        self.metadata
            .get_artifact(&name, config.credentials.as_ref())
            .await
    }

    pub(crate) async fn resolve_artifact(
        &self,
        config: &GlobalConfig,
        model: ModelRef,
    ) -> Result<ModelArtifact> {
        match model {
            ModelRef::Id(id) => self.get_model_artifact(config, &id).await,
            ModelRef::Artifact(artifact) => Ok(artifact),
        }
    }

    /// Load the model saved as `model`
    pub async fn load_model<M: Model>(
        &self,
        config: &SdkConfig,
        model: impl Into<ModelRef>,
    ) -> Result<M> {
        let artifact = self.resolve_artifact(config, model.into()).await?;
        let framework = Framework::from_name(&artifact.framework_name)
            .ok_or_else(|| Error::UnsupportedFramework(artifact.framework_name.clone()))?;

        let model_file = framework.model_file();
        let source = join_uri(&artifact.uri, model_file);
        let credentials = artifact
            .credentials
            .as_ref()
            .or(config.credentials.as_ref());

        let temp_dir = tempfile::tempdir()?;
        let destination = temp_dir.path().join(model_file);
        self.storage
            .download_file(&source, &destination, credentials)
            .await?;

        let loaded = framework.load(&destination, &artifact)?;
        info!("Loaded {} model from {}", framework, source);
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InitOptions;
    use crate::ml_integration::frameworks::SklearnEstimator;
    use crate::services::PrebuiltContainers;
    use crate::testkit::{InMemoryMetadataStore, InMemoryStorage, RecordingModelService, StorageCall};
    use std::sync::Arc;

    fn sdk_config() -> SdkConfig {
        let mut config = SdkConfig::default();
        config.init(
            None,
            InitOptions {
                project: Some("proj".to_string()),
                staging_bucket: Some("gs://staging".to_string()),
                ..Default::default()
            },
        );
        config
    }

    fn client(storage: Arc<InMemoryStorage>, metadata: Arc<InMemoryMetadataStore>) -> ModelClient {
        ModelClient::new(
            storage,
            metadata,
            Arc::new(RecordingModelService::new()),
            Arc::new(PrebuiltContainers::new()),
        )
    }

    fn artifact(framework_name: &str) -> ModelArtifact {
        ModelArtifact {
            artifact_id: Some("external".to_string()),
            resource_name: None,
            display_name: None,
            uri: "gs://bucket/external".to_string(),
            framework_name: framework_name.to_string(),
            framework_version: "2.13.0".to_string(),
            model_file: "saved_model.pb".to_string(),
            model_class: "keras.Sequential".to_string(),
            predict_schemata: None,
            project: None,
            location: None,
            credentials: None,
        }
    }

    #[tokio::test]
    async fn test_unknown_recorded_framework() {
        let storage = Arc::new(InMemoryStorage::new());
        let err = client(storage.clone(), Arc::new(InMemoryMetadataStore::new()))
            .load_model::<SklearnEstimator>(&sdk_config(), artifact("tensorflow"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Model type tensorflow not supported.");
        assert!(storage.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_artifact_is_passed_through() {
        let err = client(
            Arc::new(InMemoryStorage::new()),
            Arc::new(InMemoryMetadataStore::new()),
        )
        .load_model::<SklearnEstimator>(&sdk_config(), "does-not-exist")
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_invalid_id() {
        let err = client(
            Arc::new(InMemoryStorage::new()),
            Arc::new(InMemoryMetadataStore::new()),
        )
        .load_model::<SklearnEstimator>(&sdk_config(), "a/b")
        .await
        .unwrap_err();

        assert!(matches!(err, Error::InvalidResourceName(_)));
    }

    #[cfg(feature = "pickle")]
    #[tokio::test]
    async fn test_round_trip_by_id_and_by_record() {
        let storage = Arc::new(InMemoryStorage::new());
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let client = client(storage.clone(), metadata);
        let config = sdk_config();

        let model = SklearnEstimator::new("sklearn.ensemble.RandomForestClassifier")
            .with_param("n_estimators", 10)
            .with_fitted("n_classes_", 3)
            .with_fitted("feature_names_in_", serde_json::json!(["a", "b"]));

        let saved = client
            .save_model(&config, &model, Default::default())
            .await
            .unwrap();

        let artifact_id = saved.artifact_id.clone().unwrap();
        let by_id: SklearnEstimator = client.load_model(&config, artifact_id).await.unwrap();
        assert_eq!(by_id, model);

        let by_name: SklearnEstimator = client
            .load_model(&config, saved.resource_name.clone().unwrap())
            .await
            .unwrap();
        assert_eq!(by_name, model);

        let by_record: SklearnEstimator = client.load_model(&config, &saved).await.unwrap();
        assert_eq!(by_record, model);

        let downloads = storage
            .calls()
            .into_iter()
            .filter(|call| matches!(call, StorageCall::DownloadFile { .. }))
            .count();
        assert_eq!(downloads, 3);
    }
}

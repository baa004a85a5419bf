//! Model Management Module
//!
//! Saving models as metadata artifacts, loading them back and registering
//! them in the model registry.

pub mod exporter;
pub mod importer;
pub mod input_example;
pub mod registry;

use std::sync::Arc;

use crate::config::GlobalConfig;
use crate::services::{
    ContainerCatalog, GcsClient, MetadataClient, MetadataStore, ModelService, ModelServiceClient,
    ObjectStorage, PrebuiltContainers,
};

// Re-export key types
pub use exporter::SaveModelOptions;
pub use input_example::{
    save_input_example, ExampleArray, ExampleKind, ExampleValue, InputExample, InputExampleDocument,
    INPUT_EXAMPLE_FILE, MAX_INPUT_EXAMPLE_ROWS,
};
pub use registry::{serving_accelerator, RegisterModelOptions};

/// Entry point for the model life cycle
///
/// Holds the collaborators every operation talks to. Configuration is passed
/// to each call rather than stored.
#[derive(Clone)]
pub struct ModelClient {
    storage: Arc<dyn ObjectStorage>,
    metadata: Arc<dyn MetadataStore>,
    models: Arc<dyn ModelService>,
    containers: Arc<dyn ContainerCatalog>,
}

impl ModelClient {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        metadata: Arc<dyn MetadataStore>,
        models: Arc<dyn ModelService>,
        containers: Arc<dyn ContainerCatalog>,
    ) -> Self {
        Self {
            storage,
            metadata,
            models,
            containers,
        }
    }

    /// REST collaborators for the endpoints in `config`
    pub fn from_config(config: &GlobalConfig) -> Self {
        let storage: Arc<dyn ObjectStorage> =
            Arc::new(GcsClient::new(config.storage_endpoint.clone()));
        let metadata = Arc::new(MetadataClient::new(config.api_endpoint.clone()));
        let models = Arc::new(ModelServiceClient::new(
            config.api_endpoint.clone(),
            storage.clone(),
        ));

        Self::new(storage, metadata, models, Arc::new(PrebuiltContainers::new()))
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }
}

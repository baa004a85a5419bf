//! ML Model Metadata Types
//!
//! The metadata record describing a saved model, and the references used to
//! look one up again.

use serde::{Deserialize, Serialize};

use crate::config::GlobalConfig;
use crate::credentials::Credentials;
use crate::error::{Error, Result};

/// Schema title of saved-model artifacts
pub const EXPERIMENT_MODEL_SCHEMA_TITLE: &str = "google.ExperimentModel";
/// Schema version of saved-model artifacts
pub const EXPERIMENT_MODEL_SCHEMA_VERSION: &str = "0.0.1";

/// Schemata describing prediction inputs and outputs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictSchemata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_schema_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters_schema_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction_schema_uri: Option<String>,
}

/// A saved model as recorded in the metadata store
///
/// This is a local projection of remote state: the metadata service assigns
/// `resource_name` (and `artifact_id` when not supplied) on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub artifact_id: Option<String>,
    pub resource_name: Option<String>,
    pub display_name: Option<String>,
    /// Storage directory holding the model file
    pub uri: String,
    pub framework_name: String,
    pub framework_version: String,
    pub model_file: String,
    /// Fully-qualified model class name
    pub model_class: String,
    pub predict_schemata: Option<PredictSchemata>,
    pub project: Option<String>,
    pub location: Option<String>,
    #[serde(skip)]
    pub credentials: Option<Credentials>,
}

/// Metadata payload stored with an artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentModelMetadata {
    #[serde(default)]
    pub framework_name: String,
    #[serde(default)]
    pub framework_version: String,
    #[serde(default)]
    pub model_file: String,
    #[serde(default)]
    pub model_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predict_schemata: Option<PredictSchemata>,
}

impl ModelArtifact {
    pub fn metadata(&self) -> ExperimentModelMetadata {
        ExperimentModelMetadata {
            framework_name: self.framework_name.clone(),
            framework_version: self.framework_version.clone(),
            model_file: self.model_file.clone(),
            model_class: self.model_class.clone(),
            predict_schemata: self.predict_schemata.clone(),
        }
    }
}

/// Full resource name of a metadata artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub project: String,
    pub location: String,
    pub metadata_store_id: String,
    pub artifact_id: String,
}

impl ArtifactName {
    /// Parse `projects/{p}/locations/{l}/metadataStores/{s}/artifacts/{id}`
    pub fn parse(name: &str) -> Result<Self> {
        let parts: Vec<&str> = name.split('/').collect();
        match parts.as_slice() {
            ["projects", project, "locations", location, "metadataStores", store, "artifacts", id]
                if [project, location, store, id].iter().all(|p| !p.is_empty()) =>
            {
                Ok(Self {
                    project: project.to_string(),
                    location: location.to_string(),
                    metadata_store_id: store.to_string(),
                    artifact_id: id.to_string(),
                })
            }
            _ => Err(Error::InvalidResourceName(name.to_string())),
        }
    }

    /// Accept a full resource name, or a bare id resolved against `config`
    pub fn resolve(id_or_name: &str, config: &GlobalConfig) -> Result<Self> {
        if id_or_name.starts_with("projects/") {
            return Self::parse(id_or_name);
        }
        if id_or_name.is_empty() || id_or_name.contains('/') {
            return Err(Error::InvalidResourceName(id_or_name.to_string()));
        }

        Ok(Self {
            project: config
                .project
                .clone()
                .ok_or(Error::MissingConfig("project"))?,
            location: config.location.clone(),
            metadata_store_id: config.metadata_store_id.clone(),
            artifact_id: id_or_name.to_string(),
        })
    }
}

impl std::fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "projects/{}/locations/{}/metadataStores/{}/artifacts/{}",
            self.project, self.location, self.metadata_store_id, self.artifact_id
        )
    }
}

/// A saved model given either by id or as an already fetched record
#[derive(Debug, Clone, PartialEq)]
pub enum ModelRef {
    Id(String),
    Artifact(ModelArtifact),
}

impl From<&str> for ModelRef {
    fn from(id: &str) -> Self {
        ModelRef::Id(id.to_string())
    }
}

impl From<String> for ModelRef {
    fn from(id: String) -> Self {
        ModelRef::Id(id)
    }
}

impl From<ModelArtifact> for ModelRef {
    fn from(artifact: ModelArtifact) -> Self {
        ModelRef::Artifact(artifact)
    }
}

impl From<&ModelArtifact> for ModelRef {
    fn from(artifact: &ModelArtifact) -> Self {
        ModelRef::Artifact(artifact.clone())
    }
}

//! Experiment tracking
//!
//! Experiments and their runs are contexts in the metadata store: a
//! `system.Experiment` context with one `system.ExperimentRun` child per run.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

use crate::config::GlobalConfig;
use crate::error::{Error, Result};
use crate::initializer::SdkConfig;
use crate::services::{MetadataClient, MetadataStore, NewContext};

pub const EXPERIMENT_SCHEMA_TITLE: &str = "system.Experiment";
pub const EXPERIMENT_RUN_SCHEMA_TITLE: &str = "system.ExperimentRun";
pub const CONTEXT_SCHEMA_VERSION: &str = "0.0.1";

/// Run metadata keys
const STATE_KEY: &str = "_state";
const PARAMS_KEY: &str = "_params";
const METRICS_KEY: &str = "_metrics";
const TENSORBOARD_KEY: &str = "backing_tensorboard_resource";

const MAX_RUN_ID_LENGTH: usize = 128;

/// Life cycle state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Running,
    Complete,
    Failed,
}

/// A started experiment run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRun {
    pub experiment: String,
    pub run_name: String,
    /// Resource name of the run context
    pub resource_name: String,
    /// Resource name of the experiment context
    pub experiment_resource_name: String,
    pub state: RunState,
    pub tensorboard: Option<String>,
}

/// Starts experiment runs in the metadata store
#[derive(Clone)]
pub struct ExperimentTracker {
    metadata: Arc<dyn MetadataStore>,
}

impl ExperimentTracker {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(Arc::new(MetadataClient::new(config.api_endpoint.clone())))
    }

    /// Start `run_name` in the configured experiment
    ///
    /// Creates the experiment on first use. A run name already used in the
    /// experiment fails with [`Error::RunAlreadyExists`]. `tensorboard` is a
    /// tensorboard id or full resource name backing the run.
    pub async fn start_run(
        &self,
        config: &SdkConfig,
        run_name: &str,
        tensorboard: Option<&str>,
    ) -> Result<ExperimentRun> {
        let experiment = config
            .experiment
            .clone()
            .ok_or(Error::MissingConfig("experiment"))?;
        let run_id = run_context_id(&experiment, run_name)?;
        let scope = config.resolve_scope(None, None, None)?;

        let experiment_context = self
            .metadata
            .get_or_create_context(
                &scope,
                &config.metadata_store_id,
                &NewContext {
                    context_id: experiment.clone(),
                    display_name: Some(experiment.clone()),
                    description: config.experiment_description.clone(),
                    schema_title: EXPERIMENT_SCHEMA_TITLE.to_string(),
                    schema_version: CONTEXT_SCHEMA_VERSION.to_string(),
                    metadata: Map::new(),
                },
            )
            .await?;

        let tensorboard = tensorboard.map(|tensorboard| {
            if tensorboard.starts_with("projects/") {
                tensorboard.to_string()
            } else {
                format!("{}/tensorboards/{}", scope.parent(), tensorboard)
            }
        });

        let mut metadata = Map::new();
        metadata.insert(STATE_KEY.to_string(), json!(RunState::Running));
        metadata.insert(PARAMS_KEY.to_string(), Value::Object(Map::new()));
        metadata.insert(METRICS_KEY.to_string(), Value::Object(Map::new()));
        if let Some(tensorboard) = &tensorboard {
            metadata.insert(TENSORBOARD_KEY.to_string(), json!(tensorboard));
        }

        let run_context = self
            .metadata
            .create_context(
                &scope,
                &config.metadata_store_id,
                &NewContext {
                    context_id: run_id,
                    display_name: Some(run_name.to_string()),
                    description: None,
                    schema_title: EXPERIMENT_RUN_SCHEMA_TITLE.to_string(),
                    schema_version: CONTEXT_SCHEMA_VERSION.to_string(),
                    metadata,
                },
            )
            .await
            .map_err(|e| match e {
                Error::Api { status: 409, .. } => Error::RunAlreadyExists {
                    experiment: experiment.clone(),
                    run: run_name.to_string(),
                },
                other => other,
            })?;

        self.metadata
            .add_context_children(
                &scope,
                &experiment_context.name,
                std::slice::from_ref(&run_context.name),
            )
            .await?;

        info!("Started run {} in experiment {}", run_name, experiment);
        Ok(ExperimentRun {
            experiment,
            run_name: run_name.to_string(),
            resource_name: run_context.name,
            experiment_resource_name: experiment_context.name,
            state: RunState::Running,
            tensorboard,
        })
    }
}

/// Context id of a run: `{experiment}-{run}`
///
/// Ids are at most 128 characters of lowercase letters, digits and hyphens.
pub fn run_context_id(experiment: &str, run_name: &str) -> Result<String> {
    let id = format!("{}-{}", experiment, run_name);

    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if run_name.is_empty() || id.len() > MAX_RUN_ID_LENGTH || !valid_chars {
        return Err(Error::InvalidResourceName(id));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InitOptions;
    use crate::testkit::InMemoryMetadataStore;

    fn sdk_config(experiment: Option<&str>) -> SdkConfig {
        let mut config = SdkConfig::default();
        config.init(
            None,
            InitOptions {
                project: Some("proj".to_string()),
                experiment: experiment.map(str::to_string),
                ..Default::default()
            },
        );
        config
    }

    #[test]
    fn test_run_context_id() {
        assert_eq!(run_context_id("churn", "run-1").unwrap(), "churn-run-1");
        assert!(run_context_id("churn", "Run_1").is_err());
        assert!(run_context_id("churn", "").is_err());
        assert!(run_context_id("churn", &"x".repeat(130)).is_err());
    }

    #[tokio::test]
    async fn test_start_run_creates_experiment_and_run() {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let tracker = ExperimentTracker::new(metadata.clone());

        let run = tracker
            .start_run(&sdk_config(Some("churn")), "run-1", Some("123"))
            .await
            .unwrap();

        let store = "projects/proj/locations/us-central1/metadataStores/default";
        assert_eq!(run.experiment_resource_name, format!("{}/contexts/churn", store));
        assert_eq!(run.resource_name, format!("{}/contexts/churn-run-1", store));
        assert_eq!(run.state, RunState::Running);
        assert_eq!(
            run.tensorboard.as_deref(),
            Some("projects/proj/locations/us-central1/tensorboards/123")
        );

        let contexts = metadata.contexts();
        assert_eq!(contexts.len(), 2);
        let run_context = contexts
            .iter()
            .find(|context| context.schema_title == EXPERIMENT_RUN_SCHEMA_TITLE)
            .unwrap();
        assert_eq!(run_context.metadata[STATE_KEY], json!("RUNNING"));

        assert_eq!(
            metadata.children(&run.experiment_resource_name),
            vec![run.resource_name.clone()]
        );
    }

    #[tokio::test]
    async fn test_second_run_reuses_experiment() {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let tracker = ExperimentTracker::new(metadata.clone());
        let config = sdk_config(Some("churn"));

        tracker.start_run(&config, "run-1", None).await.unwrap();
        let run = tracker.start_run(&config, "run-2", None).await.unwrap();

        assert_eq!(metadata.contexts().len(), 3);
        assert_eq!(metadata.children(&run.experiment_resource_name).len(), 2);
        assert_eq!(run.tensorboard, None);
    }

    #[tokio::test]
    async fn test_duplicate_run_name_fails() {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let tracker = ExperimentTracker::new(metadata.clone());
        let config = sdk_config(Some("churn"));

        let run = tracker.start_run(&config, "run-1", None).await.unwrap();
        let err = tracker.start_run(&config, "run-1", None).await.unwrap_err();

        assert!(matches!(
            err,
            Error::RunAlreadyExists { ref experiment, run: ref run_name }
                if experiment == "churn" && run_name == "run-1"
        ));
        assert_eq!(
            metadata.children(&run.experiment_resource_name),
            vec![run.resource_name.clone()]
        );
        assert_eq!(metadata.contexts().len(), 2);
    }

    #[tokio::test]
    async fn test_start_run_requires_experiment() {
        let tracker = ExperimentTracker::new(Arc::new(InMemoryMetadataStore::new()));
        let err = tracker
            .start_run(&sdk_config(None), "run-1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingConfig("experiment")));
    }
}

//! CLI dispatch tests
//!
//! Drives run_mode against the in-memory collaborators.

use std::fs;
use std::sync::Arc;

use vertexkit::cli::{exit_code, load_config, parse_args, run_mode, Args, Error, Mode};
use vertexkit_core::services::PrebuiltContainers;
use vertexkit_core::testkit::{
    InMemoryMetadataStore, InMemoryStorage, RecordingModelService, StorageCall,
};
use vertexkit_core::{
    Error as SdkError, ExperimentTracker, InitOptions, ModelArtifact, ModelClient,
    RegisteredModel, SdkConfig, SklearnEstimator,
};

struct Harness {
    storage: Arc<InMemoryStorage>,
    metadata: Arc<InMemoryMetadataStore>,
    models: Arc<RecordingModelService>,
    client: ModelClient,
    tracker: ExperimentTracker,
}

fn harness() -> Harness {
    let storage = Arc::new(InMemoryStorage::new());
    let metadata = Arc::new(InMemoryMetadataStore::new());
    let models = Arc::new(RecordingModelService::new());
    let client = ModelClient::new(
        storage.clone(),
        metadata.clone(),
        models.clone(),
        Arc::new(PrebuiltContainers::new()),
    );
    let tracker = ExperimentTracker::new(metadata.clone());

    Harness {
        storage,
        metadata,
        models,
        client,
        tracker,
    }
}

fn sdk_config() -> SdkConfig {
    let mut config = SdkConfig::default();
    config.init(
        None,
        InitOptions {
            project: Some("proj".to_string()),
            staging_bucket: Some("gs://staging".to_string()),
            experiment: Some("churn".to_string()),
            ..Default::default()
        },
    );
    config
}

fn args(argv: &[&str]) -> Args {
    parse_args(
        std::iter::once("vertexkit")
            .chain(argv.iter().copied())
            .map(str::to_string),
    )
    .unwrap()
}

async fn run(h: &Harness, argv: &[&str]) -> vertexkit::cli::Result<String> {
    let args = args(argv);
    let mode = args.mode.clone().unwrap();
    run_mode(mode, &args, &sdk_config(), &h.client, &h.tracker).await
}

fn estimator() -> SklearnEstimator {
    SklearnEstimator::new("sklearn.linear_model.LogisticRegression")
        .with_param("C", 1.0)
        .with_fitted("coef_", serde_json::json!([[0.5, -0.25]]))
}

#[tokio::test]
async fn test_save_load_register_lifecycle() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    let model_file = dir.path().join("model.json");
    fs::write(&model_file, serde_json::to_string(&estimator()).unwrap()).unwrap();

    let output = run(
        &h,
        &[
            "save",
            model_file.to_str().unwrap(),
            "--artifact-id",
            "churn-model",
            "--uri",
            "gs://models/churn",
            "--json",
        ],
    )
    .await
    .unwrap();
    let saved: ModelArtifact = serde_json::from_str(&output).unwrap();
    assert_eq!(saved.uri, "gs://models/churn");
    assert_eq!(saved.framework_name, "sklearn");
    assert_eq!(
        saved.resource_name.as_deref(),
        Some("projects/proj/locations/us-central1/metadataStores/default/artifacts/churn-model")
    );
    assert!(!h
        .storage
        .calls()
        .iter()
        .any(|call| matches!(call, StorageCall::BucketExists(_) | StorageCall::CreateBucket(_))));

    let loaded_file = dir.path().join("loaded.json");
    run(
        &h,
        &["load", "churn-model", "--output", loaded_file.to_str().unwrap()],
    )
    .await
    .unwrap();
    let loaded: SklearnEstimator =
        serde_json::from_str(&fs::read_to_string(&loaded_file).unwrap()).unwrap();
    assert_eq!(loaded, estimator());

    let output = run(&h, &["register", "churn-model", "--json"]).await.unwrap();
    let registered: RegisteredModel = serde_json::from_str(&output).unwrap();
    assert!(registered.done);
    assert!(registered.display_name.starts_with("sklearn model"));

    let uploads = h.models.uploads();
    assert_eq!(uploads.len(), 1);
    let (scope, request) = &uploads[0];
    assert_eq!(scope.project, "proj");
    assert_eq!(request.artifact_uri.as_deref(), Some("gs://models/churn"));
    assert_eq!(
        request.serving_container.image_uri,
        "us-docker.pkg.dev/vertex-ai/prediction/sklearn-cpu.1-3:latest"
    );
    assert!(request.is_default_version);
}

#[tokio::test]
async fn test_save_with_input_example() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    let model_file = dir.path().join("model.json");
    let example_file = dir.path().join("example.json");
    fs::write(&model_file, serde_json::to_string(&estimator()).unwrap()).unwrap();
    fs::write(&example_file, "[[1.0, 2.0], [3.0, 4.0]]").unwrap();

    run(
        &h,
        &[
            "save",
            model_file.to_str().unwrap(),
            "--uri",
            "gs://models/with-example",
            "--input-example",
            example_file.to_str().unwrap(),
        ],
    )
    .await
    .unwrap();

    let artifacts = h.metadata.artifacts();
    assert_eq!(artifacts.len(), 1);
    let schemata = artifacts[0].predict_schemata.clone().unwrap();
    assert_eq!(
        schemata.instance_schema_uri.as_deref(),
        Some("gs://models/with-example/instance.yaml")
    );
    assert!(h
        .storage
        .object("gs://models/with-example/instance.yaml")
        .is_some());
}

#[tokio::test]
async fn test_register_without_wait() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    let model_file = dir.path().join("model.json");
    fs::write(&model_file, serde_json::to_string(&estimator()).unwrap()).unwrap();

    run(
        &h,
        &["save", model_file.to_str().unwrap(), "--artifact-id", "m1"],
    )
    .await
    .unwrap();

    let output = run(
        &h,
        &["register", "m1", "--no-wait", "--display-name", "churn"],
    )
    .await
    .unwrap();
    assert!(output.starts_with("Model upload pending:"));

    let uploads = h.models.uploads();
    assert!(!uploads[0].1.sync);
    assert_eq!(uploads[0].1.display_name, "churn");
}

#[tokio::test]
async fn test_start_run() {
    let h = harness();
    let output = run(&h, &["start-run", "run-1", "--json"]).await.unwrap();
    let run_record: serde_json::Value = serde_json::from_str(&output).unwrap();

    assert_eq!(run_record["experiment"], "churn");
    assert_eq!(run_record["run_name"], "run-1");
    assert_eq!(run_record["state"], "RUNNING");
    assert_eq!(
        h.metadata.children(
            "projects/proj/locations/us-central1/metadataStores/default/contexts/churn"
        ),
        vec![
            "projects/proj/locations/us-central1/metadataStores/default/contexts/churn-run-1"
                .to_string()
        ]
    );
}

#[tokio::test]
async fn test_capabilities_listing() {
    let h = harness();
    let output = run(&h, &["capabilities"]).await.unwrap();
    assert!(output.contains("pickle"));
    assert!(output.contains("tabular"));
}

#[tokio::test]
async fn test_load_missing_artifact_fails() {
    let h = harness();
    let err = run(&h, &["load", "nope"]).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Sdk(SdkError::Api { status: 404, .. })
    ));
    assert_eq!(exit_code(&err), 1);
}

#[test]
fn test_exit_codes() {
    assert_eq!(
        exit_code(&Error::Sdk(SdkError::MissingConfig("project"))),
        2
    );
    assert_eq!(
        exit_code(&Error::Sdk(SdkError::Config("bad".to_string()))),
        2
    );
    assert_eq!(exit_code(&Error::UnknownMode("x".to_string())), 1);
}

#[test]
fn test_load_config_flags_override_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_file = dir.path().join("config.toml");
    fs::write(
        &config_file,
        "project = \"from-file\"\nstaging_bucket = \"gs://file-bucket\"\n",
    )
    .unwrap();

    let parsed = args(&[
        "--config",
        config_file.to_str().unwrap(),
        "--project",
        "from-flag",
        "--remote",
        "capabilities",
    ]);
    let config = load_config(&parsed).unwrap();

    assert_eq!(config.project.as_deref(), Some("from-flag"));
    assert_eq!(config.staging_bucket.as_deref(), Some("gs://file-bucket"));
    assert!(config.remote());
    assert_eq!(parsed.mode, Some(Mode::Capabilities));
}

#[test]
fn test_load_config_rejects_unknown_format() {
    let parsed = args(&["--config", "settings.ini", "capabilities"]);
    let err = load_config(&parsed).unwrap_err();
    assert_eq!(exit_code(&err), 2);
}

#[test]
fn test_load_config_requires_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("settings.yml");
    let parsed = args(&["--config", missing.to_str().unwrap(), "capabilities"]);

    let err = load_config(&parsed).unwrap_err();
    assert!(matches!(err, Error::Sdk(SdkError::Config(_))));
    assert_eq!(exit_code(&err), 2);
}

#[tokio::test]
async fn test_start_run_twice_fails() {
    let h = harness();
    run(&h, &["start-run", "run-1"]).await.unwrap();

    let err = run(&h, &["start-run", "run-1"]).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Run run-1 already exists in experiment churn"
    );
    assert_eq!(exit_code(&err), 1);
}

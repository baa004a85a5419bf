//! CLI mode dispatch
//!
//! Loads configuration, builds the REST clients and dispatches to the mode
//! handlers. Handlers return the text to print.

use serde::Serialize;
use std::fs;
use tracing::error;

use vertexkit_core::{
    capabilities, Capability, ConfigManager, Error as SdkError, ExperimentTracker, InitOptions,
    InputExample, ModelClient, RegisterModelOptions, SaveModelOptions, SdkConfig,
    SklearnEstimator,
};

use crate::cli::{Args, Error, Mode, Result, EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_SUCCESS};

/// Exit code wrapper for CLI operations
pub type ExitCode = i32;

/// Run CLI mode and return exit code
pub async fn run_cli_mode(args: Args) -> ExitCode {
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_CONFIG_ERROR;
        }
    };

    let mode = match args.mode.clone() {
        Some(mode) => mode,
        None => {
            eprintln!("Error: {}", Error::MissingArgument("mode".to_string()));
            return EXIT_FAILURE;
        }
    };

    let client = ModelClient::from_config(&config);
    let tracker = ExperimentTracker::from_config(&config);

    match run_mode(mode, &args, &config, &client, &tracker).await {
        Ok(output) => {
            println!("{}", output);
            EXIT_SUCCESS
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("Error: {}", e);
            exit_code(&e)
        }
    }
}

/// Map an error to its exit code
pub fn exit_code(e: &Error) -> ExitCode {
    match e {
        Error::Sdk(SdkError::Config(_))
        | Error::Sdk(SdkError::MissingConfig(_))
        | Error::Sdk(SdkError::Toml(_)) => EXIT_CONFIG_ERROR,
        _ => EXIT_FAILURE,
    }
}

/// Configuration file, then environment, then command-line flags
pub fn load_config(args: &Args) -> Result<SdkConfig> {
    let manager = match &args.config_path {
        Some(path) => ConfigManager::with_path(path)?,
        None => ConfigManager::new()?,
    };

    let mut config = SdkConfig::new(manager.into_config());
    config.init(
        args.remote.then_some(true),
        InitOptions {
            project: args.project.clone(),
            location: args.location.clone(),
            staging_bucket: args.staging_bucket.clone(),
            experiment: args.experiment.clone(),
            ..Default::default()
        },
    );
    Ok(config)
}

/// Run one mode against the given collaborators
pub async fn run_mode(
    mode: Mode,
    args: &Args,
    config: &SdkConfig,
    client: &ModelClient,
    tracker: &ExperimentTracker,
) -> Result<String> {
    match mode {
        Mode::Save { model_file } => {
            let model: SklearnEstimator = serde_json::from_str(&fs::read_to_string(model_file)?)?;
            let input_example = match &args.input_example {
                Some(path) => Some(InputExample::from_json(serde_json::from_str(
                    &fs::read_to_string(path)?,
                )?)?),
                None => None,
            };

            let artifact = client
                .save_model(
                    config,
                    &model,
                    SaveModelOptions {
                        artifact_id: args.artifact_id.clone(),
                        uri: args.uri.clone(),
                        input_example,
                        display_name: args.display_name.clone(),
                        ..Default::default()
                    },
                )
                .await?;

            render(args.json_output, &artifact, |artifact| {
                format!(
                    "Saved model artifact {}\n  uri: {}",
                    artifact.resource_name.as_deref().unwrap_or_default(),
                    artifact.uri
                )
            })
        }
        Mode::Load { artifact } => {
            let model: SklearnEstimator = client.load_model(config, artifact).await?;
            let json = serde_json::to_string_pretty(&model)?;

            match &args.output {
                Some(path) => {
                    fs::write(path, json)?;
                    Ok(format!("Wrote {} to {}", model.class_name, path))
                }
                None => Ok(json),
            }
        }
        Mode::Register { artifact } => {
            let registered = client
                .register_model(
                    config,
                    artifact,
                    RegisterModelOptions {
                        model_id: args.model_id.clone(),
                        display_name: args.display_name.clone(),
                        serving_container_image_uri: args.image_uri.clone(),
                        use_gpu: args.use_gpu,
                        sync: !args.no_wait,
                        ..Default::default()
                    },
                )
                .await?;

            render(args.json_output, &registered, |model| match &model.resource_name {
                Some(name) => format!("Registered model {}", name),
                None => format!("Model upload pending: {}", model.operation_name),
            })
        }
        Mode::StartRun { run_name } => {
            let run = tracker
                .start_run(config, &run_name, args.tensorboard.as_deref())
                .await?;

            render(args.json_output, &run, |run| {
                format!("Started run {} in experiment {}", run.run_name, run.experiment)
            })
        }
        Mode::Capabilities => {
            let detected = capabilities();
            render(args.json_output, detected, |detected| {
                Capability::ALL
                    .iter()
                    .map(|&capability| {
                        format!(
                            "{:<8} {:<13} {:?}",
                            capability.feature(),
                            capability.library(),
                            detected.get(capability)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
    }
}

fn render<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(text(value))
    }
}

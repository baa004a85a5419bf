//! vertexkit CLI
//!
//! Parses arguments, installs logging and dispatches the requested mode.
//! Logs go to stderr so command output on stdout stays machine-readable.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use vertexkit::cli::{parse_args, run_cli_mode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let parsed = parse_args(std::env::args()).context("failed to parse arguments")?;

    // Handle --version flag
    if parsed.show_version {
        println!("vertexkit v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Handle --help flag
    if parsed.show_help || parsed.mode.is_none() {
        print_help();
        return Ok(());
    }

    let exit_code = run_cli_mode(parsed).await;
    std::process::exit(exit_code);
}

/// Print help message
fn print_help() {
    println!("vertexkit v{} - Vertex AI model life cycle", env!("CARGO_PKG_VERSION"));
    println!();
    println!("USAGE:");
    println!("    vertexkit [options] <mode> [mode-args]");
    println!();
    println!("MODES:");
    println!("    save <model.json>     Save an sklearn estimator as a model artifact");
    println!("    load <artifact>       Load a saved model (artifact id or resource name)");
    println!("    register <artifact>   Register a saved model in the model registry");
    println!("    start-run <run>       Start a run in the configured experiment");
    println!("    capabilities          Show compiled-in serialization support");
    println!();
    println!("OPTIONS:");
    println!("    --project <id>           Project (default: config, $VERTEXKIT_PROJECT)");
    println!("    --location <region>      Location (default: us-central1)");
    println!("    --staging-bucket <uri>   Staging bucket for uploads");
    println!("    --config <path>          Configuration file (.toml, .json or .yaml)");
    println!("    --remote                 Enable remote execution");
    println!("    --json                   Output JSON (for scripting)");
    println!("    --version                Show version information");
    println!("    --help                   Show this help message");
    println!();
    println!("SAVE:");
    println!("    --uri <gs://...>         Destination directory");
    println!("    --artifact-id <id>       Artifact id");
    println!("    --display-name <name>    Display name");
    println!("    --input-example <path>   JSON file with a sample of model input");
    println!();
    println!("LOAD:");
    println!("    --output <path>          Write the model here instead of stdout");
    println!();
    println!("REGISTER:");
    println!("    --model-id <id>          Model id");
    println!("    --display-name <name>    Display name");
    println!("    --image-uri <uri>        Serving container image");
    println!("    --use-gpu                Prefer a GPU serving image");
    println!("    --no-wait                Return before the upload completes");
    println!();
    println!("START-RUN:");
    println!("    --experiment <name>      Experiment (default: config)");
    println!("    --tensorboard <id>       Backing tensorboard");
    println!();
    println!("Set RUST_LOG to change log verbosity (default: info).");
}

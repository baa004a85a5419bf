//! CLI argument parsing
//!
//! - Modes: save, load, register, start-run, capabilities
//! - Global options: --project, --location, --staging-bucket, --config,
//!   --remote, --json, --version, --help

use crate::cli::{Error, Result};

/// Parsed CLI arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    /// CLI mode (None when only --help or --version is given)
    pub mode: Option<Mode>,

    /// Configuration file (default: the user config directory)
    pub config_path: Option<String>,

    /// Project override
    pub project: Option<String>,

    /// Location override
    pub location: Option<String>,

    /// Staging bucket override
    pub staging_bucket: Option<String>,

    /// Experiment for start-run
    pub experiment: Option<String>,

    /// Remote execution flag
    pub remote: bool,

    /// JSON output flag
    pub json_output: bool,

    /// Show version and exit
    pub show_version: bool,

    /// Show help and exit
    pub show_help: bool,

    /// save: destination directory
    pub uri: Option<String>,

    /// save: artifact id
    pub artifact_id: Option<String>,

    /// save/register: display name
    pub display_name: Option<String>,

    /// save: JSON file holding an input example
    pub input_example: Option<String>,

    /// load: write the model here instead of stdout
    pub output: Option<String>,

    /// register: model id
    pub model_id: Option<String>,

    /// register: serving container image
    pub image_uri: Option<String>,

    /// register: serve on GPU
    pub use_gpu: bool,

    /// register: return without waiting for the upload
    pub no_wait: bool,

    /// start-run: backing tensorboard
    pub tensorboard: Option<String>,
}

/// CLI modes
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Save the model described by a JSON file
    Save { model_file: String },

    /// Load a saved model
    Load { artifact: String },

    /// Register a saved model in the model registry
    Register { artifact: String },

    /// Start an experiment run
    StartRun { run_name: String },

    /// Show compiled-in serialization support
    Capabilities,
}

fn value<I: Iterator<Item = String>>(iter: &mut I, flag: &str, what: &str) -> Result<String> {
    iter.next()
        .ok_or_else(|| Error::MissingArgument(format!("{} requires {}", flag, what)))
}

/// Parse CLI arguments from std::env::args()
///
/// Grammar:
/// ```text
/// vertexkit [options] <mode> [mode-args]
///
/// MODES:
///   save <model.json>        → Save a model
///   load <artifact>          → Load a saved model
///   register <artifact>      → Register a saved model
///   start-run <run>          → Start an experiment run
///   capabilities             → Show serialization support
/// ```
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut iter = args.into_iter();
    let _program = iter.next(); // Skip program name

    let mut args_out = Args::default();
    let mut positional = Vec::new();

    // First pass: collect flags and positional args
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--version" | "-v" => args_out.show_version = true,
            "--help" | "-h" => args_out.show_help = true,
            "--json" => args_out.json_output = true,
            "--remote" => args_out.remote = true,
            "--use-gpu" => args_out.use_gpu = true,
            "--no-wait" => args_out.no_wait = true,
            "--config" => args_out.config_path = Some(value(&mut iter, "--config", "a path")?),
            "--project" => args_out.project = Some(value(&mut iter, "--project", "a project id")?),
            "--location" => {
                args_out.location = Some(value(&mut iter, "--location", "a location")?)
            }
            "--staging-bucket" => {
                args_out.staging_bucket =
                    Some(value(&mut iter, "--staging-bucket", "a gs:// URI")?)
            }
            "--experiment" => {
                args_out.experiment = Some(value(&mut iter, "--experiment", "a name")?)
            }
            "--uri" => args_out.uri = Some(value(&mut iter, "--uri", "a gs:// URI")?),
            "--artifact-id" => {
                args_out.artifact_id = Some(value(&mut iter, "--artifact-id", "an id")?)
            }
            "--display-name" => {
                args_out.display_name = Some(value(&mut iter, "--display-name", "a name")?)
            }
            "--input-example" => {
                args_out.input_example = Some(value(&mut iter, "--input-example", "a path")?)
            }
            "--output" => args_out.output = Some(value(&mut iter, "--output", "a path")?),
            "--model-id" => args_out.model_id = Some(value(&mut iter, "--model-id", "an id")?),
            "--image-uri" => {
                args_out.image_uri = Some(value(&mut iter, "--image-uri", "an image URI")?)
            }
            "--tensorboard" => {
                args_out.tensorboard = Some(value(&mut iter, "--tensorboard", "a tensorboard")?)
            }
            arg if arg.starts_with("--") => {
                return Err(Error::InvalidArgs(format!("Unknown option: {}", arg)));
            }
            other => positional.push(other.to_string()),
        }
    }

    // Second pass: parse mode from positional args
    if !positional.is_empty() {
        args_out.mode = Some(parse_mode(&mut positional.into_iter())?);
    }

    Ok(args_out)
}

/// Parse mode from positional arguments
fn parse_mode<I: Iterator<Item = String>>(iter: &mut I) -> Result<Mode> {
    let first = iter
        .next()
        .ok_or_else(|| Error::InvalidArgs("Expected mode argument".to_string()))?;

    let mode = match first.as_str() {
        "save" => Mode::Save {
            model_file: value(iter, "save", "a model file")?,
        },
        "load" => Mode::Load {
            artifact: value(iter, "load", "an artifact id")?,
        },
        "register" => Mode::Register {
            artifact: value(iter, "register", "an artifact id")?,
        },
        "start-run" => Mode::StartRun {
            run_name: value(iter, "start-run", "a run name")?,
        },
        "capabilities" => Mode::Capabilities,
        other => return Err(Error::UnknownMode(other.to_string())),
    };

    if let Some(extra) = iter.next() {
        return Err(Error::InvalidArgs(format!("Unexpected argument: {}", extra)));
    }
    Ok(mode)
}

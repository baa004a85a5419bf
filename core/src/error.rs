//! Error types for the vertexkit core

use std::io;

/// Errors raised while saving, loading or registering models
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Model type {0} not supported.")]
    UnsupportedFramework(String),

    #[error(
        "Input example type not supported. Valid example must be a list, dict, numpy.ndarray, or pandas.DataFrame."
    )]
    UnsupportedInputType,

    #[error("{0}")]
    InvalidInputKind(String),

    #[error("{library} is not available and is required for {purpose}. {hint}")]
    MissingOptionalDependency {
        library: &'static str,
        purpose: &'static str,
        hint: String,
    },

    #[error("No pre-built serving container found: {0}")]
    NoPrebuiltContainer(String),

    #[error("Missing required configuration: {0}")]
    MissingConfig(&'static str),

    #[error("Invalid resource name: {0}")]
    InvalidResourceName(String),

    #[error("Invalid storage URI: {0}")]
    InvalidUri(String),

    #[error("{service} request failed with status {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Run {run} already exists in experiment {experiment}")]
    RunAlreadyExists { experiment: String, run: String },

    #[error("Operation {operation} failed: {message}")]
    OperationFailed { operation: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[cfg(feature = "pickle")]
    #[error("Pickle error: {0}")]
    Pickle(#[from] serde_pickle::Error),

    #[cfg(feature = "tabular")]
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

/// Result type for vertexkit operations
pub type Result<T> = std::result::Result<T, Error>;

//! CLI module
//!
//! Provides:
//! - Argument parsing for CLI modes
//! - Configuration loading (file → env → flags)
//! - Mode dispatch (save, load, register, start-run, capabilities)

pub mod args;
pub mod dispatch;

// Re-exports
pub use args::{parse_args, Args, Mode};
pub use dispatch::{exit_code, load_config, run_cli_mode, run_mode, ExitCode};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error(transparent)]
    Sdk(#[from] vertexkit_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Exit codes (deterministic)
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, Error>;

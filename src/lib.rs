//! vertexkit: command-line front end for the vertexkit SDK
//!
//! Saves, loads and registers models and starts experiment runs from the
//! shell. The SDK itself lives in `vertexkit-core`.

pub mod cli;

pub use cli::{parse_args, run_cli_mode, Args, Mode};

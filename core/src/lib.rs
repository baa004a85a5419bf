//! vertexkit Core Module
//!
//! Client-side model life cycle for Vertex AI: save trained models as
//! metadata artifacts, load them back, register them in the model registry
//! and start experiment runs.
//!
//! ```rust,no_run
//! use vertexkit_core::{InitOptions, ModelClient, SdkConfig, SklearnEstimator};
//!
//! # async fn run() -> vertexkit_core::Result<()> {
//! let mut config = SdkConfig::default();
//! config.init(None, InitOptions {
//!     project: Some("my-project".to_string()),
//!     ..Default::default()
//! });
//!
//! let client = ModelClient::from_config(&config);
//! let model = SklearnEstimator::new("sklearn.linear_model.LinearRegression");
//! let artifact = client.save_model(&config, &model, Default::default()).await?;
//! let loaded: SklearnEstimator = client.load_model(&config, &artifact).await?;
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod config;
pub mod credentials;
pub mod error;
pub mod experiment;
pub mod initializer;
pub mod ml_integration;
pub mod naming;
pub mod services;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use capability::{capabilities, Availability, Capabilities, Capability};
pub use config::{ConfigFormat, ConfigManager, GlobalConfig, InitOptions, ResourceScope};
pub use credentials::Credentials;
pub use error::{Error, Result};
pub use experiment::{ExperimentRun, ExperimentTracker, RunState};
pub use initializer::SdkConfig;
pub use ml_integration::{
    Framework, InputExample, Model, ModelArtifact, ModelClient, ModelRef, RegisterModelOptions,
    SaveModelOptions, SklearnEstimator,
};
pub use services::RegisteredModel;

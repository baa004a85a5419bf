//! ML Integration Module
//!
//! Saved-model artifacts and the operations around them.
//!
//! # Architecture
//!
//! - `frameworks`: the frameworks a model can be saved with and their file formats
//! - `metadata`: the ExperimentModel artifact record and references to it
//! - `model_management`: save, load and register orchestration, input examples

pub mod frameworks;
pub mod metadata;
pub mod model_management;

// Re-export key types for convenience
pub use frameworks::{Framework, FrameworkSpec, Model, SklearnEstimator, FRAMEWORK_SPECS};
pub use metadata::{ArtifactName, ModelArtifact, ModelRef, PredictSchemata};
pub use model_management::{
    InputExample, InputExampleDocument, ModelClient, RegisterModelOptions, SaveModelOptions,
};

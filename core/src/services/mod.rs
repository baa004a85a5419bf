//! External collaborators
//!
//! Traits for the cloud services the orchestrators talk to, with REST
//! implementations over `reqwest`.

pub mod containers;
pub(crate) mod http;
pub mod metadata_store;
pub mod model_service;
pub mod storage;

pub use containers::{Accelerator, ContainerCatalog, PrebuiltContainers, PrebuiltImage};
pub use metadata_store::{MetadataClient, MetadataContext, MetadataStore, NewContext};
pub use model_service::{
    ModelService, ModelServiceClient, RegisteredModel, ServingContainer, UploadModelRequest,
};
pub use storage::{join_uri, GcsClient, GcsUri, ObjectStorage};

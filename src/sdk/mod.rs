//! Wiring of features into a running pipeline instance.
//!
//! An [`SdkCore`] owns the features of one instance; a [`PipelineRegistry`]
//! holds instances by name and is passed explicitly to whoever needs it.

pub mod context;
pub mod feature;
pub mod registry;
pub mod sdk_core;

use crate::upload::ClientError;
use thiserror::Error;

pub use context::{
    CONTEXT_WRITE_TIMEOUT, ContextProvider, DatadogContext, FeatureContextStore,
    SdkContextProvider,
};
pub use feature::FeatureScope;
pub use registry::{DEFAULT_INSTANCE_NAME, PipelineRegistry};
pub use sdk_core::{FeatureConfig, SdkCore, SdkCoreConfig};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("An instance named {0} is already registered")]
    InstanceAlreadyRegistered(String),
    #[error("Feature {0} is already registered")]
    FeatureAlreadyRegistered(String),
    #[error("Timed out updating the context of feature {0}")]
    ContextLockTimeout(String),
    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}

use super::RegistryError;
use super::sdk_core::SdkCore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_INSTANCE_NAME: &str = "_dd.sdk_core.default";

/// Named pipeline instances. Owned by the host and passed by reference.
#[derive(Default)]
pub struct PipelineRegistry {
    instances: RwLock<HashMap<String, Arc<SdkCore>>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: Option<&str>, core: Arc<SdkCore>) -> Result<(), RegistryError> {
        let name = name.unwrap_or(DEFAULT_INSTANCE_NAME);
        let mut instances = self.instances.write();
        if instances.contains_key(name) {
            return Err(RegistryError::InstanceAlreadyRegistered(name.to_string()));
        }
        instances.insert(name.to_string(), core);
        Ok(())
    }

    pub fn get(&self, name: Option<&str>) -> Option<Arc<SdkCore>> {
        self.instances
            .read()
            .get(name.unwrap_or(DEFAULT_INSTANCE_NAME))
            .cloned()
    }

    pub fn unregister(&self, name: Option<&str>) -> Option<Arc<SdkCore>> {
        self.instances
            .write()
            .remove(name.unwrap_or(DEFAULT_INSTANCE_NAME))
    }

    /// Removes every instance, returning them so they can be stopped.
    pub fn clear(&self) -> Vec<Arc<SdkCore>> {
        self.instances.write().drain().map(|(_, core)| core).collect()
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}

//! The loader capability: turning plugin identities into module handles.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::plugin::{PluginHandle, PluginModule};

/// Capability that instantiates plugin modules and calls into them.
///
/// The scheduler calls [`instantiate`](PluginLoader::instantiate) at most once
/// per identity and treats each call as atomic.
pub trait PluginLoader {
    /// Instantiate the module for a plugin identity.
    fn instantiate(&self, name: &str) -> Result<PluginHandle>;

    /// Call a method on an instantiated module.
    fn invoke(&self, handle: &PluginHandle, method: &str) -> Result<()> {
        handle.invoke(method)
    }
}

/// Factory producing a module for an identity.
pub type ModuleFactory = Arc<dyn Fn(&str) -> Result<PluginModule> + Send + Sync>;

/// Loader for plugins compiled into the host, keyed by identity.
#[derive(Default)]
pub struct StaticLoader {
    factories: DashMap<String, ModuleFactory>,
}

impl StaticLoader {
    /// Create an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module factory for an identity, replacing any previous one.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&str) -> Result<PluginModule> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Register a factory, consuming and returning the loader.
    pub fn with_module<F>(self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&str) -> Result<PluginModule> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Check if a factory is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Remove a factory.
    pub fn unregister(&self, name: &str) -> bool {
        self.factories.remove(name).is_some()
    }

    /// Get all registered identities.
    pub fn names(&self) -> Vec<String> {
        self.factories.iter().map(|r| r.key().clone()).collect()
    }
}

impl PluginLoader for StaticLoader {
    fn instantiate(&self, name: &str) -> Result<PluginHandle> {
        // Cloned out so the factory runs without holding a shard lock.
        let factory = self
            .factories
            .get(name)
            .map(|r| r.value().clone())
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))?;

        let module = factory(name)?;
        if module.name() != name {
            return Err(Error::module_load(
                name,
                format!("factory produced module for {}", module.name()),
            ));
        }

        Ok(PluginHandle::new(module))
    }
}

impl std::fmt::Debug for StaticLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticLoader")
            .field("module_count", &self.factories.len())
            .finish()
    }
}

//! Plugin module handles and the set of loaded plugins.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::manifest::Manifest;

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

/// A callable exposed by a plugin module.
pub type HookFn = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// An instantiated plugin module: a table from method name to callable.
pub struct PluginModule {
    id: u64,
    name: String,
    hooks: RwLock<HashMap<String, HookFn>>,
}

impl PluginModule {
    /// Create an empty module for a plugin identity.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            hooks: RwLock::new(HashMap::new()),
        }
    }

    /// Add a method, consuming the module.
    pub fn with_hook<F>(self, method: impl Into<String>, hook: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.register_hook(method, hook);
        self
    }

    /// Add or replace a method.
    pub fn register_hook<F>(&self, method: impl Into<String>, hook: F)
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.write().insert(method.into(), Arc::new(hook));
    }

    /// Get the module ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the plugin identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the module exposes a method.
    pub fn has_hook(&self, method: &str) -> bool {
        self.hooks.read().contains_key(method)
    }

    /// Names of every exposed method.
    pub fn hook_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.hooks.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Call a method by name.
    pub fn invoke(&self, method: &str) -> Result<()> {
        // Released before the call so hooks may register further hooks.
        let hook = self
            .hooks
            .read()
            .get(method)
            .cloned()
            .ok_or_else(|| Error::method_not_found(&self.name, method))?;

        hook()
    }
}

impl std::fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginModule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("hooks", &self.hook_names())
            .finish()
    }
}

/// Shared handle to an instantiated plugin module.
#[derive(Clone)]
pub struct PluginHandle {
    module: Arc<PluginModule>,
}

impl PluginHandle {
    /// Create a new plugin handle.
    pub fn new(module: PluginModule) -> Self {
        Self {
            module: Arc::new(module),
        }
    }

    /// Get the module ID.
    pub fn id(&self) -> u64 {
        self.module.id()
    }

    /// Get the plugin identity.
    pub fn name(&self) -> &str {
        self.module.name()
    }

    /// Check if the module exposes a method.
    pub fn has_hook(&self, method: &str) -> bool {
        self.module.has_hook(method)
    }

    /// Call a method by name.
    pub fn invoke(&self, method: &str) -> Result<()> {
        self.module.invoke(method)
    }

    /// Get the underlying module.
    pub fn inner(&self) -> &PluginModule {
        &self.module
    }
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}

/// Every plugin instantiated by a scheduling run.
///
/// Manifest data is copied in at load time and never aliases the registry.
#[derive(Debug, Clone, Default)]
pub struct LoadedPluginSet {
    plugins: HashMap<String, PluginHandle>,
    order: Vec<String>,
    services: HashMap<String, Vec<PluginHandle>>,
    plugin_data: HashMap<String, Manifest>,
}

impl LoadedPluginSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, manifest: &Manifest, handle: PluginHandle) {
        self.services
            .entry(manifest.service.clone())
            .or_default()
            .push(handle.clone());
        self.plugins.insert(manifest.name.clone(), handle);
        self.plugin_data.insert(manifest.name.clone(), manifest.clone());
        self.order.push(manifest.name.clone());
    }

    /// Get a plugin handle by identity.
    pub fn get(&self, name: &str) -> Option<&PluginHandle> {
        self.plugins.get(name)
    }

    /// Check if a plugin is loaded.
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Handles sharing a service class, in load order.
    pub fn service(&self, service: &str) -> &[PluginHandle] {
        self.services.get(service).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Manifest data as it was when the plugin loaded.
    pub fn manifest(&self, name: &str) -> Option<&Manifest> {
        self.plugin_data.get(name)
    }

    /// Identities in the order they were loaded.
    pub fn load_order(&self) -> &[String] {
        &self.order
    }

    /// Iterate handles in load order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &PluginHandle> + '_ {
        self.order.iter().filter_map(|name| self.plugins.get(name))
    }

    /// Get plugin count.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if no plugins are loaded.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestBuilder;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_module_hooks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let module = PluginModule::new("clock").with_hook("tick", move || {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });

        assert!(module.has_hook("tick"));
        module.invoke("tick").unwrap();
        module.invoke("tick").unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 2);

        let result = module.invoke("tock");
        assert!(matches!(
            result,
            Err(Error::MethodNotFound { plugin, method }) if plugin == "clock" && method == "tock"
        ));
    }

    #[test]
    fn test_hook_errors_propagate() {
        let module = PluginModule::new("quitter").with_hook("setup", || Err(Error::exit(2, "done")));
        assert_eq!(module.invoke("setup").unwrap_err().exit_code(), Some(2));
    }

    #[test]
    fn test_handle_clone_shares_module() {
        let handle = PluginHandle::new(PluginModule::new("clock"));
        let other = handle.clone();

        assert_eq!(handle.id(), other.id());
        handle.inner().register_hook("late", || Ok(()));
        assert!(other.has_hook("late"));
    }

    #[test]
    fn test_loaded_set() {
        let mut set = LoadedPluginSet::new();
        let alsa = ManifestBuilder::new("alsa").service("output").build_unchecked();
        let pulse = ManifestBuilder::new("pulse").service("output").build_unchecked();

        set.insert(&alsa, PluginHandle::new(PluginModule::new("alsa")));
        set.insert(&pulse, PluginHandle::new(PluginModule::new("pulse")));

        assert_eq!(set.len(), 2);
        assert_eq!(set.load_order(), &["alsa".to_string(), "pulse".to_string()]);
        assert_eq!(set.service("output").len(), 2);
        assert!(set.service("input").is_empty());
        assert_eq!(set.manifest("pulse").unwrap().service, "output");

        let names: Vec<&str> = set.iter().rev().map(PluginHandle::name).collect();
        assert_eq!(names, vec!["pulse", "alsa"]);
    }
}

//! Plugin registry holding every known manifest and its load flags.

use std::collections::HashMap;

use serde::Deserialize;

use crate::directive::DeclaredDirective;
use crate::error::{Error, Result};
use crate::manifest::Manifest;

/// Order in which registry entries are iterated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistryOrder {
    /// Keep the order manifests were registered in.
    #[default]
    Discovery,
    /// Sort entries by identity.
    Sorted,
}

/// Configuration for the plugin registry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RegistryConfig {
    /// Maximum number of plugins allowed. Unbounded unless the host sets one.
    pub max_plugins: usize,
    /// Iteration order for directive evaluation and loading.
    pub ordering: RegistryOrder,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_plugins: usize::MAX,
            ordering: RegistryOrder::Discovery,
        }
    }
}

impl RegistryConfig {
    /// Create a new registry configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of plugins.
    pub fn with_max_plugins(mut self, max: usize) -> Self {
        self.max_plugins = max;
        self
    }

    /// Set the iteration order.
    pub fn with_ordering(mut self, ordering: RegistryOrder) -> Self {
        self.ordering = ordering;
        self
    }
}

/// A registered plugin and its scheduling flags.
#[derive(Debug, Clone)]
pub struct PluginEntry {
    manifest: Manifest,
    directives: Vec<DeclaredDirective>,
    loaded: bool,
    can_load: bool,
}

impl PluginEntry {
    fn new(manifest: Manifest) -> Self {
        let directives = manifest
            .directives
            .iter()
            .map(DeclaredDirective::from_record)
            .collect();

        Self {
            manifest,
            directives,
            loaded: false,
            can_load: false,
        }
    }

    /// Get the manifest.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Plugin identity.
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Human-readable name.
    pub fn human_name(&self) -> &str {
        &self.manifest.human_name
    }

    /// Service class.
    pub fn service(&self) -> &str {
        &self.manifest.service
    }

    /// Declared directives.
    pub fn directives(&self) -> &[DeclaredDirective] {
        &self.directives
    }

    /// Whether the plugin module has been instantiated.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Whether the plugin is eligible to load in the current cycle.
    pub fn can_load(&self) -> bool {
        self.can_load
    }

    pub(crate) fn block(&mut self) {
        self.can_load = false;
    }

    pub(crate) fn directive_mut(&mut self, slot: usize) -> &mut DeclaredDirective {
        &mut self.directives[slot]
    }
}

/// Plugin registry keyed by identity, iterated in a stable order.
pub struct PluginRegistry {
    config: RegistryConfig,
    entries: Vec<PluginEntry>,
    index: HashMap<String, usize>,
}

impl PluginRegistry {
    /// Create a new plugin registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Create with default configuration.
    pub fn default_config() -> Self {
        Self::new(RegistryConfig::default())
    }

    /// Build a registry from a collection of manifests.
    pub fn from_manifests<I>(config: RegistryConfig, manifests: I) -> Result<Self>
    where
        I: IntoIterator<Item = Manifest>,
    {
        let mut registry = Self::new(config);
        for manifest in manifests {
            registry.register(manifest)?;
        }
        Ok(registry)
    }

    /// Get the registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a manifest.
    pub fn register(&mut self, manifest: Manifest) -> Result<()> {
        if self.entries.len() >= self.config.max_plugins {
            return Err(Error::Registry(format!(
                "registry full: max {} plugins",
                self.config.max_plugins
            )));
        }

        if self.index.contains_key(&manifest.name) {
            return Err(Error::DuplicatePlugin(manifest.name));
        }

        tracing::debug!(plugin = %manifest.name, "Registered {}.", manifest.human_name);

        let entry = PluginEntry::new(manifest);
        match self.config.ordering {
            RegistryOrder::Discovery => {
                self.index.insert(entry.name().to_string(), self.entries.len());
                self.entries.push(entry);
            }
            RegistryOrder::Sorted => {
                let at = self.entries.partition_point(|e| e.name() < entry.name());
                self.entries.insert(at, entry);
                self.reindex();
            }
        }

        Ok(())
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name().to_string(), i))
            .collect();
    }

    /// Get an entry by identity.
    pub fn get(&self, name: &str) -> Option<&PluginEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Check if an identity is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Position of an identity in iteration order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Iterate entries in registry order.
    pub fn iter(&self) -> std::slice::Iter<'_, PluginEntry> {
        self.entries.iter()
    }

    /// All identities in registry order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name().to_string()).collect()
    }

    /// Identities not yet loaded, in registry order.
    pub fn pending(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| !e.loaded)
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Check if every registered plugin is loaded.
    pub fn all_loaded(&self) -> bool {
        self.entries.iter().all(|e| e.loaded)
    }

    /// Get plugin count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entry(&self, position: usize) -> &PluginEntry {
        &self.entries[position]
    }

    pub(crate) fn entry_mut(&mut self, position: usize) -> &mut PluginEntry {
        &mut self.entries[position]
    }

    /// Mark every unloaded plugin eligible for the coming cycle.
    pub(crate) fn reset_eligibility(&mut self) {
        for entry in self.entries.iter_mut().filter(|e| !e.loaded) {
            entry.can_load = true;
        }
    }

    pub(crate) fn mark_loaded(&mut self, position: usize) {
        let entry = &mut self.entries[position];
        entry.loaded = true;
        entry.can_load = false;
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("config", &self.config)
            .field("plugin_count", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestBuilder;

    fn manifest(name: &str) -> Manifest {
        ManifestBuilder::new(name).build_unchecked()
    }

    #[test]
    fn test_registry_creation() {
        let registry = PluginRegistry::default_config();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.all_loaded());
    }

    #[test]
    fn test_register_plugin() {
        let mut registry = PluginRegistry::default_config();
        registry.register(manifest("clock")).unwrap();

        assert!(registry.contains("clock"));
        assert_eq!(registry.len(), 1);

        let entry = registry.get("clock").unwrap();
        assert!(!entry.is_loaded());
        assert!(!entry.can_load());
        assert_eq!(registry.pending(), vec!["clock".to_string()]);
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = PluginRegistry::default_config();
        registry.register(manifest("clock")).unwrap();

        let result = registry.register(manifest("clock"));
        assert!(matches!(result, Err(Error::DuplicatePlugin(name)) if name == "clock"));
    }

    #[test]
    fn test_discovery_order_preserved() {
        let registry = PluginRegistry::from_manifests(
            RegistryConfig::default(),
            ["zeta", "alpha", "mid"].map(manifest),
        )
        .unwrap();

        assert_eq!(registry.names(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.position("alpha"), Some(1));
    }

    #[test]
    fn test_sorted_order() {
        let config = RegistryConfig::new().with_ordering(RegistryOrder::Sorted);
        let registry =
            PluginRegistry::from_manifests(config, ["zeta", "alpha", "mid"].map(manifest)).unwrap();

        assert_eq!(registry.names(), vec!["alpha", "mid", "zeta"]);
        assert_eq!(registry.position("zeta"), Some(2));
        assert_eq!(registry.get("mid").unwrap().name(), "mid");
    }

    #[test]
    fn test_max_plugins() {
        let config = RegistryConfig::new().with_max_plugins(2);
        let mut registry = PluginRegistry::new(config);

        registry.register(manifest("plugin-1")).unwrap();
        registry.register(manifest("plugin-2")).unwrap();

        let result = registry.register(manifest("plugin-3"));
        assert!(matches!(result, Err(Error::Registry(_))));
    }

    #[test]
    fn test_default_config_is_unbounded() {
        let names: Vec<String> = (0..300).map(|i| format!("plugin-{}", i)).collect();
        let registry = PluginRegistry::from_manifests(
            RegistryConfig::default(),
            names.iter().map(|n| manifest(n)),
        )
        .unwrap();

        assert_eq!(registry.len(), 300);
    }

    #[test]
    fn test_loaded_entry_is_not_eligible() {
        let mut registry =
            PluginRegistry::from_manifests(RegistryConfig::default(), ["a"].map(manifest)).unwrap();

        registry.reset_eligibility();
        assert!(registry.entry(0).can_load());

        registry.mark_loaded(0);
        assert!(registry.entry(0).is_loaded());
        assert!(!registry.entry(0).can_load());

        registry.reset_eligibility();
        assert!(!registry.entry(0).can_load());
    }

    #[test]
    fn test_reset_eligibility_skips_loaded() {
        let mut registry =
            PluginRegistry::from_manifests(RegistryConfig::default(), ["a", "b"].map(manifest))
                .unwrap();

        registry.mark_loaded(0);
        registry.reset_eligibility();

        assert!(!registry.entry(0).can_load());
        assert!(registry.entry(1).can_load());
        assert_eq!(registry.pending(), vec!["b".to_string()]);
    }
}

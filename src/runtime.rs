//! Host-facing plugin runtime: initialize, then setup / loop / cleanup.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::lifecycle::{LifecycleDispatcher, LifecycleEvent, LifecycleHooks};
use crate::loader::PluginLoader;
use crate::manifest::{normalize, Manifest};
use crate::plugin::LoadedPluginSet;
use crate::registry::{PluginRegistry, RegistryConfig};
use crate::scheduler::Scheduler;

#[cfg(feature = "metrics-prometheus")]
use crate::metrics::PluginMetrics;

/// Configuration for the plugin runtime.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Registry configuration.
    pub registry: RegistryConfig,
}

impl RuntimeConfig {
    /// Create a new runtime configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the registry configuration.
    pub fn with_registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Parse configuration from a TOML string.
    #[cfg(feature = "toml")]
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Plugin runtime tying manifests, scheduling and lifecycle dispatch together.
///
/// The runtime holds no loaded plugins itself. [`initialize`] returns the
/// loaded set and the host passes it back to each lifecycle call.
///
/// [`initialize`]: PluginRuntime::initialize
pub struct PluginRuntime<L: PluginLoader> {
    config: RuntimeConfig,
    loader: L,
    hooks: Arc<RwLock<LifecycleHooks>>,
    #[cfg(feature = "metrics-prometheus")]
    metrics: Option<Arc<PluginMetrics>>,
}

impl<L: PluginLoader> PluginRuntime<L> {
    /// Create a new plugin runtime.
    pub fn new(config: RuntimeConfig, loader: L) -> Self {
        Self {
            config,
            loader,
            hooks: Arc::new(RwLock::new(LifecycleHooks::new())),
            #[cfg(feature = "metrics-prometheus")]
            metrics: None,
        }
    }

    /// Create with default configuration.
    pub fn with_loader(loader: L) -> Self {
        Self::new(RuntimeConfig::default(), loader)
    }

    /// Attach a metrics collector.
    #[cfg(feature = "metrics-prometheus")]
    pub fn with_metrics(mut self, metrics: Arc<PluginMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Get the runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get the plugin loader.
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Add a lifecycle event handler.
    ///
    /// Handlers added while a call is in progress take effect from the next
    /// call.
    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.hooks.write().on_event(handler);
    }

    // Handlers are snapshotted so a handler or plugin hook may call
    // `on_event` without contending for the lock.
    fn hooks(&self) -> LifecycleHooks {
        self.hooks.read().clone()
    }

    /// Normalize raw manifest records and load every plugin.
    pub fn initialize<I>(&self, records: I) -> Result<LoadedPluginSet>
    where
        I: IntoIterator<Item = Value>,
    {
        let manifests = records
            .into_iter()
            .map(|record| normalize(&record))
            .collect::<Result<Vec<_>>>()?;

        self.initialize_manifests(manifests)
    }

    /// Load every plugin from already normalized manifests.
    pub fn initialize_manifests<I>(&self, manifests: I) -> Result<LoadedPluginSet>
    where
        I: IntoIterator<Item = Manifest>,
    {
        #[cfg(feature = "metrics-prometheus")]
        let started = std::time::Instant::now();

        let hooks = self.hooks();
        let registry = PluginRegistry::from_manifests(self.config.registry.clone(), manifests)?;
        for entry in registry.iter() {
            hooks.emit_registered(entry.name());
        }

        let mut scheduler = Scheduler::new(registry, &self.loader, &hooks);
        match scheduler.run() {
            Ok(_report) => {
                #[cfg(feature = "metrics-prometheus")]
                if let Some(metrics) = &self.metrics {
                    metrics.record_initialize(&_report, started.elapsed().as_secs_f64());
                }
                Ok(scheduler.into_loaded())
            }
            Err(err) => {
                tracing::error!(
                    loaded = scheduler.loaded().len(),
                    "Plugin initialization aborted: {}",
                    err
                );
                #[cfg(feature = "metrics-prometheus")]
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure();
                }
                Err(err)
            }
        }
    }

    /// Broadcast `setup` to the loaded plugins.
    pub fn setup(&self, plugins: &LoadedPluginSet) -> Result<()> {
        let hooks = self.hooks();
        LifecycleDispatcher::new(&self.loader, &hooks).setup(plugins)
    }

    /// Broadcast `loop` to the loaded plugins.
    pub fn run_loop(&self, plugins: &LoadedPluginSet) -> Result<()> {
        let hooks = self.hooks();
        LifecycleDispatcher::new(&self.loader, &hooks).run_loop(plugins)
    }

    /// Broadcast `cleanup` to the loaded plugins.
    pub fn cleanup(&self, plugins: &LoadedPluginSet) -> Result<()> {
        let hooks = self.hooks();
        LifecycleDispatcher::new(&self.loader, &hooks).cleanup(plugins)
    }
}

impl<L: PluginLoader> std::fmt::Debug for PluginRuntime<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRuntime")
            .field("config", &self.config)
            .finish()
    }
}

//! Prometheus metrics integration for plugin loading.

use prometheus::{Counter, Histogram, Registry};

use crate::scheduler::LoadReport;

/// Configuration for plugin metrics collection.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Metric prefix for all plugin metrics.
    pub prefix: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prefix: "apples_plugin".to_string(),
        }
    }
}

impl MetricsConfig {
    /// Create a new metrics configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the metric prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

/// Plugin metrics collector.
pub struct PluginMetrics {
    config: MetricsConfig,
    registry: Registry,
    plugins_loaded: Counter,
    load_cycles: Counter,
    methods_run: Counter,
    load_failures: Counter,
    initialize_duration: Histogram,
}

impl PluginMetrics {
    /// Create a new metrics collector with the given configuration.
    pub fn new(config: MetricsConfig) -> prometheus::Result<Self> {
        let registry = Registry::new();

        let plugins_loaded = Counter::new(
            format!("{}_loaded_total", config.prefix),
            "Total number of plugins loaded",
        )?;

        let load_cycles = Counter::new(
            format!("{}_load_cycles_total", config.prefix),
            "Total number of scheduling cycles run",
        )?;

        let methods_run = Counter::new(
            format!("{}_deferred_methods_total", config.prefix),
            "Total number of run-after-load methods invoked",
        )?;

        let load_failures = Counter::new(
            format!("{}_load_failures_total", config.prefix),
            "Total number of aborted initializations",
        )?;

        let initialize_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                format!("{}_initialize_duration_seconds", config.prefix),
                "Plugin initialization duration in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;

        registry.register(Box::new(plugins_loaded.clone()))?;
        registry.register(Box::new(load_cycles.clone()))?;
        registry.register(Box::new(methods_run.clone()))?;
        registry.register(Box::new(load_failures.clone()))?;
        registry.register(Box::new(initialize_duration.clone()))?;

        Ok(Self {
            config,
            registry,
            plugins_loaded,
            load_cycles,
            methods_run,
            load_failures,
            initialize_duration,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Get the Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a completed initialization.
    pub fn record_initialize(&self, report: &LoadReport, duration_secs: f64) {
        self.plugins_loaded.inc_by(report.load_order.len() as f64);
        self.load_cycles.inc_by(report.cycles as f64);
        self.methods_run.inc_by(report.methods_run as f64);
        self.initialize_duration.observe(duration_secs);
    }

    /// Record an aborted initialization.
    pub fn record_failure(&self) {
        self.load_failures.inc();
    }

    /// Get the total number of plugins loaded.
    pub fn plugins_loaded_total(&self) -> u64 {
        self.plugins_loaded.get() as u64
    }

    /// Get the total number of scheduling cycles.
    pub fn load_cycles_total(&self) -> u64 {
        self.load_cycles.get() as u64
    }

    /// Get the total number of deferred methods run.
    pub fn methods_run_total(&self) -> u64 {
        self.methods_run.get() as u64
    }

    /// Get the total number of aborted initializations.
    pub fn load_failures_total(&self) -> u64 {
        self.load_failures.get() as u64
    }
}

impl std::fmt::Debug for PluginMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginMetrics")
            .field("config", &self.config)
            .field("plugins_loaded", &self.plugins_loaded_total())
            .field("load_cycles", &self.load_cycles_total())
            .field("load_failures", &self.load_failures_total())
            .finish()
    }
}

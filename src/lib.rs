//! # apples-runtime
//!
//! Directive-driven plugin loading with a shared setup / loop / cleanup
//! lifecycle.
//!
//! This crate provides:
//! - **Manifest Normalization** - Canonicalize versioned manifest records
//! - **Load Directives** - `load-before`, `load-after`, `load-deny` and
//!   `run-after-load`, addressed by identity or by `$service` class
//! - **Load-Order Scheduling** - Iterate to a fixed point, detecting deadlocks
//! - **Pluggable Loading** - Instantiate modules through a [`PluginLoader`]
//! - **Lifecycle Dispatch** - Broadcast setup, loop and cleanup hooks
//! - **Metrics Hooks** - Track loading with Prometheus
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use apples_runtime::{PluginModule, PluginRuntime, StaticLoader};
//! use serde_json::json;
//!
//! let loader = StaticLoader::new()
//!     .with_module("clock", |name| Ok(PluginModule::new(name).with_hook("loop", || Ok(()))))
//!     .with_module("display", |name| Ok(PluginModule::new(name)));
//!
//! let runtime = PluginRuntime::with_loader(loader);
//! let plugins = runtime.initialize(vec![
//!     json!({ "format": "0.1.0", "name": "clock",
//!             "load-directives": [{ "directive": "load-after", "module": "display" }] }),
//!     json!({ "format": "0.1.0", "name": "display" }),
//! ])?;
//!
//! runtime.setup(&plugins)?;
//! runtime.run_loop(&plugins)?;
//! runtime.cleanup(&plugins)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `toml` (default): Parse manifests and runtime configuration from TOML
//! - `metrics-prometheus`: Prometheus metrics integration

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod directive;
mod error;
mod evaluator;
mod lifecycle;
mod loader;
mod manifest;
mod plugin;
mod registry;
mod resolver;
mod runtime;
mod scheduler;

#[cfg(feature = "metrics-prometheus")]
mod metrics;

pub use directive::{DeclaredDirective, Directive, PluginRef};
pub use error::{Error, Result};
pub use evaluator::DirectiveEvaluator;
pub use lifecycle::{LifecycleDispatcher, LifecycleEvent, LifecycleHook, LifecycleHooks};
pub use loader::{ModuleFactory, PluginLoader, StaticLoader};
pub use manifest::{normalize, Manifest, ManifestBuilder, FORMAT_0_1_0};
pub use plugin::{HookFn, LoadedPluginSet, PluginHandle, PluginModule};
pub use registry::{PluginEntry, PluginRegistry, RegistryConfig, RegistryOrder};
pub use resolver::{resolve, Resolved};
pub use runtime::{PluginRuntime, RuntimeConfig};
pub use scheduler::{CycleOutcome, LoadReport, Scheduler};

#[cfg(feature = "metrics-prometheus")]
pub use metrics::{MetricsConfig, PluginMetrics};

/// Crate version for compatibility checks.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

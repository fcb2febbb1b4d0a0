//! Lifecycle dispatch and lifecycle event hooks.

use std::sync::Arc;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::loader::PluginLoader;
use crate::plugin::LoadedPluginSet;

/// Lifecycle methods broadcast to loaded plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    /// Called once after loading completes.
    Setup,
    /// The host's main loop body.
    Loop,
    /// Called once before the host exits.
    Cleanup,
}

impl LifecycleHook {
    /// Method name plugins register for this hook.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Loop => "loop",
            Self::Cleanup => "cleanup",
        }
    }
}

impl std::fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle event for hooks.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// Plugin manifest was registered.
    Registered {
        /// Plugin name.
        name: String,
        /// Registration time.
        at: Instant,
    },
    /// Plugin module was instantiated.
    Loaded {
        /// Plugin name.
        name: String,
        /// Scheduling cycle it loaded in.
        cycle: usize,
        /// Load time.
        at: Instant,
    },
    /// A `run-after-load` method fired.
    MethodRan {
        /// Plugin name.
        name: String,
        /// Method invoked.
        method: String,
        /// Invocation time.
        at: Instant,
    },
    /// A lifecycle hook was dispatched to a plugin.
    Dispatched {
        /// Plugin name.
        name: String,
        /// Hook dispatched.
        hook: LifecycleHook,
        /// Dispatch time.
        at: Instant,
    },
    /// Loading aborted.
    Failed {
        /// Error message.
        message: String,
        /// Failure time.
        at: Instant,
    },
}

impl LifecycleEvent {
    /// Get the plugin name, if the event concerns one plugin.
    pub fn plugin_name(&self) -> Option<&str> {
        match self {
            Self::Registered { name, .. }
            | Self::Loaded { name, .. }
            | Self::MethodRan { name, .. }
            | Self::Dispatched { name, .. } => Some(name),
            Self::Failed { .. } => None,
        }
    }

    /// Get the event timestamp.
    pub fn timestamp(&self) -> Instant {
        match self {
            Self::Registered { at, .. }
            | Self::Loaded { at, .. }
            | Self::MethodRan { at, .. }
            | Self::Dispatched { at, .. }
            | Self::Failed { at, .. } => *at,
        }
    }

    /// Get the event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Registered { .. } => "registered",
            Self::Loaded { .. } => "loaded",
            Self::MethodRan { .. } => "method-ran",
            Self::Dispatched { .. } => "dispatched",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Hooks for lifecycle events.
///
/// Cloning shares the registered handlers.
#[derive(Clone)]
pub struct LifecycleHooks {
    handlers: Vec<Arc<dyn Fn(&LifecycleEvent) + Send + Sync>>,
}

impl LifecycleHooks {
    /// Create new lifecycle hooks.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a lifecycle event handler.
    pub fn on_event<F>(&mut self, handler: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    /// Emit a lifecycle event.
    pub fn emit(&self, event: LifecycleEvent) {
        for handler in &self.handlers {
            handler(&event);
        }
    }

    /// Emit a registered event.
    pub fn emit_registered(&self, name: &str) {
        self.emit(LifecycleEvent::Registered {
            name: name.to_string(),
            at: Instant::now(),
        });
    }

    /// Emit a loaded event.
    pub fn emit_loaded(&self, name: &str, cycle: usize) {
        self.emit(LifecycleEvent::Loaded {
            name: name.to_string(),
            cycle,
            at: Instant::now(),
        });
    }

    /// Emit a method-ran event.
    pub fn emit_method_ran(&self, name: &str, method: &str) {
        self.emit(LifecycleEvent::MethodRan {
            name: name.to_string(),
            method: method.to_string(),
            at: Instant::now(),
        });
    }

    /// Emit a dispatched event.
    pub fn emit_dispatched(&self, name: &str, hook: LifecycleHook) {
        self.emit(LifecycleEvent::Dispatched {
            name: name.to_string(),
            hook,
            at: Instant::now(),
        });
    }

    /// Emit a failed event.
    pub fn emit_failed(&self, message: &str) {
        self.emit(LifecycleEvent::Failed {
            message: message.to_string(),
            at: Instant::now(),
        });
    }
}

impl Default for LifecycleHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}

/// Broadcasts lifecycle hooks across a loaded plugin set.
///
/// Setup and loop run in load order, cleanup in reverse load order. The
/// first failing plugin stops the broadcast and its error is returned as is.
pub struct LifecycleDispatcher<'a, L: PluginLoader + ?Sized> {
    loader: &'a L,
    hooks: &'a LifecycleHooks,
}

impl<'a, L: PluginLoader + ?Sized> LifecycleDispatcher<'a, L> {
    /// Create a dispatcher calling through `loader`.
    pub fn new(loader: &'a L, hooks: &'a LifecycleHooks) -> Self {
        Self { loader, hooks }
    }

    /// Broadcast `setup`.
    pub fn setup(&self, plugins: &LoadedPluginSet) -> Result<()> {
        self.dispatch(plugins, LifecycleHook::Setup).map(drop)
    }

    /// Broadcast `loop`.
    pub fn run_loop(&self, plugins: &LoadedPluginSet) -> Result<()> {
        self.dispatch(plugins, LifecycleHook::Loop).map(drop)
    }

    /// Broadcast `cleanup`.
    pub fn cleanup(&self, plugins: &LoadedPluginSet) -> Result<()> {
        self.dispatch(plugins, LifecycleHook::Cleanup).map(drop)
    }

    /// Broadcast a hook, returning how many plugins provided it.
    pub fn dispatch(&self, plugins: &LoadedPluginSet, hook: LifecycleHook) -> Result<usize> {
        let method = hook.as_str();
        let providers: Vec<_> = match hook {
            LifecycleHook::Cleanup => plugins.iter().rev().filter(|p| p.has_hook(method)).collect(),
            _ => plugins.iter().filter(|p| p.has_hook(method)).collect(),
        };

        if providers.is_empty() {
            return match hook {
                LifecycleHook::Loop => {
                    tracing::error!("No loop function provided by any plugins.");
                    Err(Error::NoLoopProvided)
                }
                _ => {
                    tracing::warn!("No {} function provided by any plugins.", method);
                    Ok(0)
                }
            };
        }

        for plugin in &providers {
            tracing::trace!(plugin = plugin.name(), "Dispatching {}.", method);
            self.loader.invoke(plugin, method)?;
            self.hooks.emit_dispatched(plugin.name(), hook);
        }

        Ok(providers.len())
    }
}

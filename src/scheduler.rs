//! Load-order scheduling: the fixed point over directive evaluation.
//!
//! Each cycle resets eligibility, evaluates every directive and then loads
//! every plugin that is still eligible. Directives can only block, so a
//! cycle that loads nothing while plugins remain means the directive set
//! can never be satisfied.

use crate::error::{Error, Result};
use crate::evaluator::DirectiveEvaluator;
use crate::lifecycle::LifecycleHooks;
use crate::loader::PluginLoader;
use crate::plugin::LoadedPluginSet;
use crate::registry::PluginRegistry;

/// What happened during one scheduling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Cycle number, starting at 1.
    pub cycle: usize,
    /// Plugins loaded this cycle, in load order.
    pub loaded: Vec<String>,
    /// Plugins still unloaded after the cycle.
    pub pending: Vec<String>,
    /// Deferred methods that ran this cycle.
    pub methods_run: usize,
}

impl CycleOutcome {
    /// Whether at least one plugin loaded.
    pub fn progressed(&self) -> bool {
        !self.loaded.is_empty()
    }

    /// Whether every plugin is now loaded.
    pub fn all_loaded(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Summary of a completed scheduling run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Loading cycles executed.
    pub cycles: usize,
    /// Identities in the order they loaded.
    pub load_order: Vec<String>,
    /// Deferred methods that ran, including the settle pass.
    pub methods_run: usize,
}

/// Drives plugins from a registry into a [`LoadedPluginSet`].
///
/// A failed run leaves already loaded plugins in place; nothing is rolled
/// back and no cleanup is dispatched. [`loaded`](Scheduler::loaded) exposes
/// the partial set for the host to inspect.
pub struct Scheduler<'a, L: PluginLoader + ?Sized> {
    registry: PluginRegistry,
    loader: &'a L,
    hooks: &'a LifecycleHooks,
    loaded: LoadedPluginSet,
    cycles: usize,
    methods_run: usize,
}

impl<'a, L: PluginLoader + ?Sized> Scheduler<'a, L> {
    /// Create a scheduler over a registry.
    pub fn new(registry: PluginRegistry, loader: &'a L, hooks: &'a LifecycleHooks) -> Self {
        Self {
            registry,
            loader,
            hooks,
            loaded: LoadedPluginSet::new(),
            cycles: 0,
            methods_run: 0,
        }
    }

    /// Run cycles until every plugin is loaded, then settle deferred methods.
    pub fn run(&mut self) -> Result<LoadReport> {
        tracing::info!("Loading plugins.");

        loop {
            let outcome = self.cycle()?;

            if outcome.all_loaded() {
                break;
            }

            if !outcome.progressed() {
                tracing::error!(
                    pending = ?outcome.pending,
                    "Plugins are being blocked from loading by directives."
                );
                let err = Error::DirectiveDeadlock {
                    pending: outcome.pending,
                };
                self.hooks.emit_failed(&err.to_string());
                return Err(err);
            }
        }

        self.settle()?;
        tracing::info!("All plugins loaded.");

        Ok(LoadReport {
            cycles: self.cycles,
            load_order: self.loaded.load_order().to_vec(),
            methods_run: self.methods_run,
        })
    }

    /// Run a single scheduling cycle.
    pub fn cycle(&mut self) -> Result<CycleOutcome> {
        self.cycles += 1;
        let cycle = self.cycles;
        tracing::debug!(cycle, "Starting load cycle.");

        let methods_run = self.evaluate()?;

        let mut loaded = Vec::new();
        for position in 0..self.registry.len() {
            let entry = self.registry.entry(position);
            if entry.is_loaded() || !entry.can_load() {
                continue;
            }
            loaded.push(self.load(position)?);
        }

        Ok(CycleOutcome {
            cycle,
            loaded,
            pending: self.registry.pending(),
            methods_run,
        })
    }

    /// Re-evaluate directives without loading anything.
    ///
    /// Fires deferred methods whose last dependency loaded in the final cycle.
    /// Already executed methods never run again.
    pub fn settle(&mut self) -> Result<usize> {
        self.evaluate()
    }

    fn evaluate(&mut self) -> Result<usize> {
        self.registry.reset_eligibility();
        let ran = DirectiveEvaluator::new(self.loader, &self.loaded, self.hooks)
            .evaluate_all(&mut self.registry)?;
        self.methods_run += ran;
        Ok(ran)
    }

    fn load(&mut self, position: usize) -> Result<String> {
        let manifest = self.registry.entry(position).manifest();
        let name = manifest.name.clone();

        tracing::info!(plugin = %name, "Loading {}.", manifest.human_name);
        let handle = self.loader.instantiate(&name)?;
        tracing::info!(plugin = %name, "Loaded {}.", manifest.human_name);

        self.loaded.insert(manifest, handle);
        self.registry.mark_loaded(position);
        self.hooks.emit_loaded(&name, self.cycles);

        Ok(name)
    }

    /// Get the registry with its current flags.
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Plugins loaded so far.
    pub fn loaded(&self) -> &LoadedPluginSet {
        &self.loaded
    }

    /// Cycles executed so far.
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    /// Consume the scheduler, keeping the loaded plugins.
    pub fn into_loaded(self) -> LoadedPluginSet {
        self.loaded
    }
}

impl<L: PluginLoader + ?Sized> std::fmt::Debug for Scheduler<'_, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("registry", &self.registry)
            .field("loaded", &self.loaded.len())
            .field("cycles", &self.cycles)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::StaticLoader;
    use crate::manifest::{Manifest, ManifestBuilder};
    use crate::plugin::PluginModule;
    use crate::registry::RegistryConfig;

    fn loader_for(names: &[&str]) -> StaticLoader {
        let loader = StaticLoader::new();
        for name in names {
            loader.register(*name, |name| Ok(PluginModule::new(name)));
        }
        loader
    }

    fn registry(manifests: Vec<Manifest>) -> PluginRegistry {
        PluginRegistry::from_manifests(RegistryConfig::default(), manifests).unwrap()
    }

    #[test]
    fn test_single_cycle_without_directives() {
        let loader = loader_for(&["a", "b", "c"]);
        let hooks = LifecycleHooks::new();
        let mut scheduler = Scheduler::new(
            registry(["a", "b", "c"].map(|n| ManifestBuilder::new(n).build_unchecked()).to_vec()),
            &loader,
            &hooks,
        );

        let report = scheduler.run().unwrap();
        assert_eq!(report.cycles, 1);
        assert_eq!(report.load_order, vec!["a", "b", "c"]);
        assert!(scheduler.registry().all_loaded());
    }

    #[test]
    fn test_empty_registry() {
        let loader = StaticLoader::new();
        let hooks = LifecycleHooks::new();
        let mut scheduler = Scheduler::new(PluginRegistry::default_config(), &loader, &hooks);

        let report = scheduler.run().unwrap();
        assert_eq!(report.cycles, 1);
        assert!(scheduler.into_loaded().is_empty());
    }

    #[test]
    fn test_stepwise_cycles() {
        let loader = loader_for(&["a", "b"]);
        let hooks = LifecycleHooks::new();
        let mut scheduler = Scheduler::new(
            registry(vec![
                ManifestBuilder::new("a").load_after("b").build_unchecked(),
                ManifestBuilder::new("b").build_unchecked(),
            ]),
            &loader,
            &hooks,
        );

        let first = scheduler.cycle().unwrap();
        assert_eq!(first.cycle, 1);
        assert_eq!(first.loaded, vec!["b"]);
        assert!(first.progressed());
        assert!(!first.all_loaded());

        let second = scheduler.cycle().unwrap();
        assert_eq!(second.loaded, vec!["a"]);
        assert!(second.all_loaded());
        assert_eq!(scheduler.loaded().load_order(), &["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_deadlock_keeps_partial_set() {
        let loader = loader_for(&["free", "a", "b", "c"]);
        let hooks = LifecycleHooks::new();
        let mut scheduler = Scheduler::new(
            registry(vec![
                ManifestBuilder::new("free").build_unchecked(),
                ManifestBuilder::new("a").load_after("b").build_unchecked(),
                ManifestBuilder::new("b").load_after("c").build_unchecked(),
                ManifestBuilder::new("c").load_after("a").build_unchecked(),
            ]),
            &loader,
            &hooks,
        );

        let err = scheduler.run().unwrap_err();
        assert!(matches!(
            err,
            Error::DirectiveDeadlock { ref pending } if pending == &["a", "b", "c"]
        ));
        assert_eq!(scheduler.cycles(), 2);
        assert_eq!(scheduler.loaded().load_order(), &["free".to_string()]);
    }

    #[test]
    fn test_loader_errors_propagate() {
        let loader = loader_for(&["a"]);
        let hooks = LifecycleHooks::new();
        let mut scheduler = Scheduler::new(
            registry(vec![
                ManifestBuilder::new("a").build_unchecked(),
                ManifestBuilder::new("missing").build_unchecked(),
            ]),
            &loader,
            &hooks,
        );

        let err = scheduler.run().unwrap_err();
        assert!(matches!(err, Error::ModuleNotFound(ref name) if name == "missing"));
        assert!(scheduler.loaded().contains("a"));
    }
}

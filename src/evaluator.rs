//! Evaluation of load directives against the registry.
//!
//! Directives only ever clear `can-load` flags or fire deferred methods.
//! They are evaluated plugin by plugin in registry order and directive by
//! directive in declaration order, so flags cleared earlier in a pass are
//! visible to every later directive of the same pass.

use crate::directive::Directive;
use crate::error::{Error, Result};
use crate::lifecycle::LifecycleHooks;
use crate::loader::PluginLoader;
use crate::plugin::LoadedPluginSet;
use crate::registry::PluginRegistry;
use crate::resolver::resolve;

/// Applies every declared directive for one scheduling pass.
pub struct DirectiveEvaluator<'a, L: PluginLoader + ?Sized> {
    loader: &'a L,
    loaded: &'a LoadedPluginSet,
    hooks: &'a LifecycleHooks,
}

impl<'a, L: PluginLoader + ?Sized> DirectiveEvaluator<'a, L> {
    /// Create an evaluator. `loaded` supplies handles for deferred methods.
    pub fn new(loader: &'a L, loaded: &'a LoadedPluginSet, hooks: &'a LifecycleHooks) -> Self {
        Self {
            loader,
            loaded,
            hooks,
        }
    }

    /// Evaluate every directive of every entry. Returns the number of
    /// deferred methods that ran.
    pub fn evaluate_all(&self, registry: &mut PluginRegistry) -> Result<usize> {
        let mut ran = 0;
        for subject in 0..registry.len() {
            for slot in 0..registry.entry(subject).directives().len() {
                if self.evaluate(registry, subject, slot)? {
                    ran += 1;
                }
            }
        }
        Ok(ran)
    }

    /// Evaluate one directive. Returns true if a deferred method ran.
    pub fn evaluate(&self, registry: &mut PluginRegistry, subject: usize, slot: usize) -> Result<bool> {
        let entry = registry.entry(subject);
        let name = entry.name().to_string();
        let directive = entry.directives()[slot].directive(&name)?.clone();
        let objects: Vec<String> = resolve(directive.module(), registry)
            .map(str::to_string)
            .collect();
        let trail = format!("{}.{}.{}", name, directive.kind(), directive.module());

        match &directive {
            Directive::LoadBefore { .. } => {
                for object in &objects {
                    let target = require(registry, &name, object)?;
                    if !registry.entry(subject).is_loaded() {
                        tracing::debug!(
                            "Prevented {} from loading this cycle. ({})",
                            registry.entry(target).human_name(),
                            trail
                        );
                        registry.entry_mut(target).block();
                    }
                }
                Ok(false)
            }
            Directive::LoadAfter { .. } => {
                for object in &objects {
                    let target = require(registry, &name, object)?;
                    if !registry.entry(target).is_loaded() {
                        tracing::debug!(
                            "Prevented {} from loading this cycle. ({})",
                            registry.entry(subject).human_name(),
                            trail
                        );
                        registry.entry_mut(subject).block();
                    }
                }
                Ok(false)
            }
            Directive::LoadDeny { .. } => {
                for object in objects.iter().filter(|o| **o != name) {
                    if let Some(denied) = registry.get(object) {
                        tracing::error!("Found denied plugin {}. ({})", denied.human_name(), trail);
                        self.hooks.emit_failed(&format!("denied plugin {}", object));
                        return Err(Error::denied_plugin(
                            &name,
                            object,
                            directive.module().to_string(),
                        ));
                    }
                }
                Ok(false)
            }
            Directive::RunAfterLoad { method, .. } => {
                if registry.entry(subject).directives()[slot].is_executed() {
                    return Ok(false);
                }

                for object in &objects {
                    let target = require(registry, &name, object)?;
                    if !registry.entry(target).is_loaded() {
                        tracing::debug!(
                            "Cannot run {} for {} yet. Required module {} is not loaded. ({})",
                            method,
                            registry.entry(subject).human_name(),
                            object,
                            trail
                        );
                        return Ok(false);
                    }
                }

                if !registry.entry(subject).is_loaded() {
                    tracing::debug!(
                        "Did not run {} for {} because the module is not loaded. ({})",
                        method,
                        registry.entry(subject).human_name(),
                        trail
                    );
                    return Ok(false);
                }

                registry.entry_mut(subject).directive_mut(slot).mark_executed();
                let handle = self
                    .loaded
                    .get(&name)
                    .ok_or_else(|| Error::ModuleNotFound(name.clone()))?;
                self.loader.invoke(handle, method)?;
                self.hooks.emit_method_ran(&name, method);
                tracing::debug!(
                    "Ran {} for {}. ({})",
                    method,
                    registry.entry(subject).human_name(),
                    trail
                );
                Ok(true)
            }
        }
    }
}

fn require(registry: &PluginRegistry, subject: &str, object: &str) -> Result<usize> {
    registry
        .position(object)
        .ok_or_else(|| Error::unknown_plugin(subject, object))
}

//! Expansion of plugin references into concrete identities.

use std::iter::Once;
use std::slice;

use crate::directive::PluginRef;
use crate::registry::{PluginEntry, PluginRegistry};

/// Lazily resolved identities for a [`PluginRef`].
///
/// A service reference yields every registered plugin of that class in
/// registry order. An identity reference yields itself, registered or not.
pub enum Resolved<'a> {
    /// Single identity.
    Identity(Once<&'a str>),
    /// Scan of the registry for a service class.
    Service {
        /// Service class being matched.
        service: &'a str,
        /// Remaining entries to scan.
        entries: slice::Iter<'a, PluginEntry>,
    },
}

impl<'a> Iterator for Resolved<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Identity(once) => once.next(),
            Self::Service { service, entries } => entries
                .find(|entry| entry.service() == *service)
                .map(PluginEntry::name),
        }
    }
}

/// Resolve a reference against the registry.
pub fn resolve<'a>(reference: &'a PluginRef, registry: &'a PluginRegistry) -> Resolved<'a> {
    match reference {
        PluginRef::Identity(name) => Resolved::Identity(std::iter::once(name.as_str())),
        PluginRef::Service(service) => Resolved::Service {
            service,
            entries: registry.iter(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestBuilder;
    use crate::registry::RegistryConfig;

    fn registry() -> PluginRegistry {
        PluginRegistry::from_manifests(
            RegistryConfig::default(),
            vec![
                ManifestBuilder::new("alsa").service("output").build_unchecked(),
                ManifestBuilder::new("ui").build_unchecked(),
                ManifestBuilder::new("pulse").service("output").build_unchecked(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_service() {
        let registry = registry();
        let reference = PluginRef::parse("$output");

        let names: Vec<&str> = resolve(&reference, &registry).collect();
        assert_eq!(names, vec!["alsa", "pulse"]);
    }

    #[test]
    fn test_resolve_service_defaults_to_identity() {
        let registry = registry();
        let reference = PluginRef::parse("$ui");

        let names: Vec<&str> = resolve(&reference, &registry).collect();
        assert_eq!(names, vec!["ui"]);
    }

    #[test]
    fn test_resolve_identity_without_existence_check() {
        let registry = registry();
        let reference = PluginRef::parse("missing");

        let names: Vec<&str> = resolve(&reference, &registry).collect();
        assert_eq!(names, vec!["missing"]);

        let reference = PluginRef::parse("$nothing");
        assert_eq!(resolve(&reference, &registry).count(), 0);
    }
}

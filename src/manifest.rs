//! Plugin manifest schema and format normalization.
//!
//! Manifests arrive as loosely structured records tagged with a `format`
//! version. [`normalize`] dispatches on that tag and produces a canonical
//! [`Manifest`] with every required field present. Directive records are
//! carried through untouched; they are only interpreted once the scheduler
//! evaluates them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::directive::{Directive, PluginRef};
use crate::error::{Error, Result};

/// The manifest format understood by this runtime.
pub const FORMAT_0_1_0: &str = "0.1.0";

/// Canonical plugin manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Manifest format version.
    pub format: String,

    /// Plugin identity (unique within a registry).
    pub name: String,

    /// Human-readable name.
    #[serde(rename = "human-name")]
    pub human_name: String,

    /// Service class, shared by interchangeable plugins.
    pub service: String,

    /// Requirement declarations. Opaque to the scheduler.
    #[serde(default)]
    pub requirements: Vec<Value>,

    /// Raw load directive records.
    #[serde(rename = "load-directives", default)]
    pub directives: Vec<Value>,

    /// File references.
    #[serde(default)]
    pub files: Vec<Value>,

    /// Any other fields from the record, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    /// Create a canonical manifest with every optional field defaulted.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            format: FORMAT_0_1_0.to_string(),
            human_name: name.clone(),
            service: name.clone(),
            name,
            requirements: Vec::new(),
            directives: Vec::new(),
            files: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Parse a JSON manifest record and normalize it.
    pub fn from_json(content: &str) -> Result<Self> {
        let record: Value =
            serde_json::from_str(content).map_err(|e| Error::ManifestParse(e.to_string()))?;
        normalize(&record)
    }

    /// Parse a TOML manifest record and normalize it.
    #[cfg(feature = "toml")]
    pub fn from_toml(content: &str) -> Result<Self> {
        let record: Value =
            toml::from_str(content).map_err(|e| Error::ManifestParse(e.to_string()))?;
        normalize(&record)
    }

    /// Emit the canonical record for this manifest.
    pub fn to_record(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| Error::ManifestParse(e.to_string()))
    }

    /// Serialize to a pretty JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::ManifestParse(e.to_string()))
    }

    /// Validate the manifest.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::missing_field("name"));
        }

        if self.service.is_empty() {
            return Err(Error::invalid_manifest(format!(
                "{} declares an empty service class",
                self.name
            )));
        }

        if self.name.starts_with(PluginRef::SERVICE_MARKER) {
            return Err(Error::invalid_manifest(format!(
                "plugin identity may not start with '{}': {}",
                PluginRef::SERVICE_MARKER,
                self.name
            )));
        }

        Ok(())
    }
}

/// Normalize a raw manifest record into a canonical [`Manifest`].
///
/// Dispatch is by the exact `format` string of the record.
pub fn normalize(record: &Value) -> Result<Manifest> {
    let fields = record
        .as_object()
        .ok_or_else(|| Error::invalid_manifest("manifest record must be a table"))?;

    let format = fields
        .get("format")
        .ok_or_else(|| Error::missing_field("format"))?
        .as_str()
        .ok_or_else(|| Error::invalid_manifest("format must be a string"))?;

    match format {
        FORMAT_0_1_0 => normalize_0_1_0(fields),
        other => Err(Error::unsupported_format(other)),
    }
}

fn normalize_0_1_0(fields: &Map<String, Value>) -> Result<Manifest> {
    let name = match fields.get("name") {
        None | Some(Value::Null) => return Err(Error::missing_field("name")),
        Some(value) => value
            .as_str()
            .ok_or_else(|| Error::invalid_manifest("name must be a string"))?,
    };

    let mut canonical = Map::new();
    if fields.get("human-name").map_or(true, Value::is_null) {
        tracing::warn!(plugin = name, "No human name found for {}. Using module name.", name);
        canonical.insert("human-name".into(), Value::from(name));
    }
    canonical.insert("service".into(), Value::from(name));
    canonical.insert("requirements".into(), Value::Array(Vec::new()));
    canonical.insert("load-directives".into(), Value::Array(Vec::new()));
    canonical.insert("files".into(), Value::Array(Vec::new()));

    for (key, value) in fields {
        if !value.is_null() {
            canonical.insert(key.clone(), value.clone());
        }
    }

    let manifest: Manifest = serde_json::from_value(Value::Object(canonical))
        .map_err(|e| Error::ManifestParse(format!("{}: {}", name, e)))?;
    manifest.validate()?;

    tracing::debug!(
        plugin = %manifest.name,
        "Detected manifest format {} for {}.",
        FORMAT_0_1_0,
        manifest.human_name
    );
    Ok(manifest)
}

/// Builder for creating manifests.
pub struct ManifestBuilder {
    manifest: Manifest,
}

impl ManifestBuilder {
    /// Create a new manifest builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            manifest: Manifest::new(name),
        }
    }

    /// Set the human-readable name.
    pub fn human_name(mut self, human_name: impl Into<String>) -> Self {
        self.manifest.human_name = human_name.into();
        self
    }

    /// Set the service class.
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.manifest.service = service.into();
        self
    }

    /// Add a requirement declaration.
    pub fn requirement(mut self, requirement: impl Into<Value>) -> Self {
        self.manifest.requirements.push(requirement.into());
        self
    }

    /// Add a file reference.
    pub fn file(mut self, file: impl Into<Value>) -> Self {
        self.manifest.files.push(file.into());
        self
    }

    /// Add a typed directive.
    pub fn directive(mut self, directive: Directive) -> Self {
        self.manifest.directives.push(directive.to_record());
        self
    }

    /// Add a raw directive record, bypassing any typing.
    pub fn raw_directive(mut self, record: Value) -> Self {
        self.manifest.directives.push(record);
        self
    }

    /// Require this plugin to load before `reference`.
    pub fn load_before(self, reference: &str) -> Self {
        self.directive(Directive::LoadBefore {
            module: PluginRef::parse(reference),
        })
    }

    /// Require this plugin to load after `reference`.
    pub fn load_after(self, reference: &str) -> Self {
        self.directive(Directive::LoadAfter {
            module: PluginRef::parse(reference),
        })
    }

    /// Refuse to run alongside `reference`.
    pub fn load_deny(self, reference: &str) -> Self {
        self.directive(Directive::LoadDeny {
            module: PluginRef::parse(reference),
        })
    }

    /// Run `method` once this plugin and `reference` are loaded.
    pub fn run_after_load(self, reference: &str, method: impl Into<String>) -> Self {
        self.directive(Directive::RunAfterLoad {
            module: PluginRef::parse(reference),
            method: method.into(),
        })
    }

    /// Add an extra manifest field.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.manifest.extra.insert(key.into(), value.into());
        self
    }

    /// Build and validate the manifest.
    pub fn build(self) -> Result<Manifest> {
        self.manifest.validate()?;
        Ok(self.manifest)
    }

    /// Build without validation.
    pub fn build_unchecked(self) -> Manifest {
        self.manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_defaults() {
        let manifest = normalize(&json!({ "format": "0.1.0", "name": "audio" })).unwrap();

        assert_eq!(manifest.name, "audio");
        assert_eq!(manifest.human_name, "audio");
        assert_eq!(manifest.service, "audio");
        assert!(manifest.requirements.is_empty());
        assert!(manifest.directives.is_empty());
        assert!(manifest.files.is_empty());
    }

    #[test]
    fn test_normalize_overlays_record() {
        let manifest = normalize(&json!({
            "format": "0.1.0",
            "name": "mpd",
            "human-name": "MPD Player",
            "service": "player",
            "load-directives": [{ "directive": "load-after", "module": "$output" }],
            "version": "1.2.0",
        }))
        .unwrap();

        assert_eq!(manifest.human_name, "MPD Player");
        assert_eq!(manifest.service, "player");
        assert_eq!(manifest.directives.len(), 1);
        assert_eq!(manifest.extra.get("version"), Some(&json!("1.2.0")));
    }

    #[test]
    fn test_normalize_null_fields_take_defaults() {
        let manifest = normalize(&json!({
            "format": "0.1.0",
            "name": "mpd",
            "human-name": null,
            "service": null,
        }))
        .unwrap();

        assert_eq!(manifest.human_name, "mpd");
        assert_eq!(manifest.service, "mpd");
    }

    #[test]
    fn test_unsupported_format() {
        let result = normalize(&json!({ "format": "0.2.0", "name": "x" }));
        assert!(matches!(result, Err(Error::UnsupportedManifestFormat(f)) if f == "0.2.0"));
    }

    #[test]
    fn test_missing_fields() {
        assert!(matches!(
            normalize(&json!({ "name": "x" })),
            Err(Error::MissingManifestField(f)) if f == "format"
        ));
        assert!(matches!(
            normalize(&json!({ "format": "0.1.0" })),
            Err(Error::MissingManifestField(f)) if f == "name"
        ));
        assert!(matches!(
            normalize(&json!({ "format": "0.1.0", "name": null })),
            Err(Error::MissingManifestField(f)) if f == "name"
        ));
        assert!(matches!(
            normalize(&json!(["not", "a", "table"])),
            Err(Error::InvalidManifest(_))
        ));
    }

    #[test]
    fn test_non_string_name_is_invalid() {
        assert!(matches!(
            normalize(&json!({ "format": "0.1.0", "name": 42 })),
            Err(Error::InvalidManifest(_))
        ));
        assert!(matches!(
            normalize(&json!({ "format": "0.1.0", "name": ["a"] })),
            Err(Error::InvalidManifest(_))
        ));
    }

    #[test]
    fn test_directives_not_validated_at_normalization() {
        let manifest = normalize(&json!({
            "format": "0.1.0",
            "name": "x",
            "load-directives": [{ "directive": "load-sideways" }],
        }))
        .unwrap();
        assert_eq!(manifest.directives.len(), 1);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let first = normalize(&json!({
            "format": "0.1.0",
            "name": "ui",
            "requirements": ["pygame"],
            "load-directives": [{ "directive": "run-after-load", "module": "core", "method": "ready" }],
            "files": [["ui.py", "ui.py"]],
            "author": "someone",
        }))
        .unwrap();

        let second = normalize(&first.to_record().unwrap()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_record().unwrap(), second.to_record().unwrap());
    }

    #[test]
    fn test_builder() {
        let manifest = ManifestBuilder::new("ui")
            .human_name("User Interface")
            .service("frontend")
            .load_after("$backend")
            .run_after_load("core", "ready")
            .build()
            .unwrap();

        assert_eq!(manifest.service, "frontend");
        assert_eq!(
            manifest.directives[0],
            json!({ "directive": "load-after", "module": "$backend" })
        );
        assert_eq!(
            manifest.directives[1],
            json!({ "directive": "run-after-load", "module": "core", "method": "ready" })
        );
    }

    #[test]
    fn test_validation() {
        assert!(ManifestBuilder::new("").build().is_err());
        assert!(ManifestBuilder::new("$svc").build().is_err());
        assert!(ManifestBuilder::new("ok").service("").build().is_err());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_manifest_toml() {
        let toml = r#"
format = "0.1.0"
name = "clock"
human-name = "Clock"
service = "time"

[[load-directives]]
directive = "load-before"
module = "$display"
"#;

        let manifest = Manifest::from_toml(toml).unwrap();
        assert_eq!(manifest.name, "clock");
        assert_eq!(manifest.service, "time");
        assert_eq!(manifest.directives.len(), 1);
    }

    #[test]
    fn test_manifest_json() {
        let manifest = Manifest::from_json(r#"{"format": "0.1.0", "name": "clock"}"#).unwrap();
        assert_eq!(manifest.human_name, "clock");
        assert!(Manifest::from_json("{").is_err());
    }
}

//! Load directives and plugin references.

use std::fmt;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};

/// A reference to one plugin by identity, or to every plugin of a service class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum PluginRef {
    /// Exact plugin identity.
    Identity(String),
    /// Every plugin whose service class matches.
    Service(String),
}

impl PluginRef {
    /// Prefix marking a service class reference.
    pub const SERVICE_MARKER: char = '$';

    /// Parse a reference as written in a manifest.
    pub fn parse(reference: &str) -> Self {
        match reference.strip_prefix(Self::SERVICE_MARKER) {
            Some(service) => Self::Service(service.to_string()),
            None => Self::Identity(reference.to_string()),
        }
    }

    /// Check if this is a service class reference.
    pub fn is_service(&self) -> bool {
        matches!(self, Self::Service(_))
    }
}

impl From<String> for PluginRef {
    fn from(reference: String) -> Self {
        Self::parse(&reference)
    }
}

impl fmt::Display for PluginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity(name) => write!(f, "{}", name),
            Self::Service(service) => write!(f, "{}{}", Self::SERVICE_MARKER, service),
        }
    }
}

/// A load directive declared by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "directive", rename_all = "kebab-case")]
pub enum Directive {
    /// The referenced plugins wait until the declaring plugin has loaded.
    LoadBefore {
        /// Referenced plugins.
        module: PluginRef,
    },
    /// The declaring plugin waits until every referenced plugin has loaded.
    LoadAfter {
        /// Referenced plugins.
        module: PluginRef,
    },
    /// Loading fails outright if any referenced plugin is present.
    LoadDeny {
        /// Referenced plugins.
        module: PluginRef,
    },
    /// Call `method` on the declaring plugin once it and every referenced
    /// plugin have loaded.
    RunAfterLoad {
        /// Referenced plugins.
        module: PluginRef,
        /// Method to invoke on the declaring plugin.
        method: String,
    },
}

impl Directive {
    /// Parse a directive record.
    pub fn from_record(record: &Value) -> std::result::Result<Self, String> {
        Self::deserialize(record).map_err(|e| e.to_string())
    }

    /// Emit the manifest record for this directive.
    pub fn to_record(&self) -> Value {
        let mut record = json!({
            "directive": self.kind(),
            "module": self.module().to_string(),
        });
        if let Self::RunAfterLoad { method, .. } = self {
            record["method"] = Value::from(method.as_str());
        }
        record
    }

    /// Directive kind as written in manifests.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LoadBefore { .. } => "load-before",
            Self::LoadAfter { .. } => "load-after",
            Self::LoadDeny { .. } => "load-deny",
            Self::RunAfterLoad { .. } => "run-after-load",
        }
    }

    /// The referenced plugins.
    pub fn module(&self) -> &PluginRef {
        match self {
            Self::LoadBefore { module }
            | Self::LoadAfter { module }
            | Self::LoadDeny { module }
            | Self::RunAfterLoad { module, .. } => module,
        }
    }
}

/// A directive as declared by one registry entry, with its one-shot state.
///
/// Parse failures are kept rather than raised so that a malformed record
/// only fails the run when it is first evaluated.
#[derive(Debug, Clone)]
pub struct DeclaredDirective {
    parsed: std::result::Result<Directive, String>,
    executed: bool,
}

impl DeclaredDirective {
    /// Wrap a raw directive record.
    pub fn from_record(record: &Value) -> Self {
        Self {
            parsed: Directive::from_record(record),
            executed: false,
        }
    }

    /// Get the parsed directive, or the parse failure attributed to `plugin`.
    pub fn directive(&self, plugin: &str) -> Result<&Directive> {
        self.parsed
            .as_ref()
            .map_err(|reason| Error::malformed_directive(plugin, reason.clone()))
    }

    /// Whether a `run-after-load` action has already fired.
    pub fn is_executed(&self) -> bool {
        self.executed
    }

    pub(crate) fn mark_executed(&mut self) {
        self.executed = true;
    }
}

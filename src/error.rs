//! Error types for plugin loading and lifecycle operations.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or driving plugins.
#[derive(Error, Debug)]
pub enum Error {
    /// Manifest declares a format version no normalizer understands.
    #[error("unsupported manifest format: {0}")]
    UnsupportedManifestFormat(String),

    /// Invalid manifest.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Missing required field in manifest.
    #[error("missing required manifest field: {0}")]
    MissingManifestField(String),

    /// Manifest parse error.
    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    /// Runtime configuration could not be read.
    #[error("config error: {0}")]
    Config(String),

    /// Two manifests declared the same identity.
    #[error("duplicate plugin identity: {0}")]
    DuplicatePlugin(String),

    /// Registry error.
    #[error("registry error: {0}")]
    Registry(String),

    /// A directive record could not be understood.
    #[error("malformed directive in {plugin}: {reason}")]
    MalformedDirective {
        /// Plugin declaring the directive.
        plugin: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A directive referenced an identity that is not registered.
    #[error("{plugin} references unknown plugin {reference}")]
    UnknownPlugin {
        /// Plugin declaring the directive.
        plugin: String,
        /// The unresolved identity.
        reference: String,
    },

    /// A `load-deny` directive matched a registered plugin.
    #[error("plugin {denied} is denied by {plugin} ({plugin}.load-deny.{reference})")]
    DeniedPlugin {
        /// Plugin declaring the denial.
        plugin: String,
        /// Plugin that was found and denied.
        denied: String,
        /// Reference as written in the directive.
        reference: String,
    },

    /// No plugin could load in a cycle although some remain unloaded.
    #[error("plugins are blocked from loading by directives: {}", .pending.join(", "))]
    DirectiveDeadlock {
        /// Identities still waiting to load.
        pending: Vec<String>,
    },

    /// The loader has no module for an identity.
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// The loader found a module but could not instantiate it.
    #[error("failed to load module {name}: {message}")]
    ModuleLoadError {
        /// Plugin identity.
        name: String,
        /// Failure description.
        message: String,
    },

    /// A module handle does not expose the requested method.
    #[error("method {method} not found on {plugin}")]
    MethodNotFound {
        /// Plugin identity.
        plugin: String,
        /// Requested method name.
        method: String,
    },

    /// No loaded plugin provides a loop hook.
    #[error("no loop function provided by any plugins")]
    NoLoopProvided,

    /// A plugin asked the host to terminate.
    #[error("exit requested with code {code}: {message}")]
    Exit {
        /// Process exit code.
        code: i32,
        /// Optional explanation.
        message: String,
    },
}

impl Error {
    /// Create an unsupported manifest format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedManifestFormat(format.into())
    }

    /// Create an invalid manifest error.
    pub fn invalid_manifest(msg: impl Into<String>) -> Self {
        Self::InvalidManifest(msg.into())
    }

    /// Create a missing manifest field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingManifestField(field.into())
    }

    /// Create a malformed directive error.
    pub fn malformed_directive(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDirective {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown plugin error.
    pub fn unknown_plugin(plugin: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::UnknownPlugin {
            plugin: plugin.into(),
            reference: reference.into(),
        }
    }

    /// Create a denied plugin error.
    pub fn denied_plugin(
        plugin: impl Into<String>,
        denied: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self::DeniedPlugin {
            plugin: plugin.into(),
            denied: denied.into(),
            reference: reference.into(),
        }
    }

    /// Create a module load error.
    pub fn module_load(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModuleLoadError {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a method not found error.
    pub fn method_not_found(plugin: impl Into<String>, method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            plugin: plugin.into(),
            method: method.into(),
        }
    }

    /// Create an exit request.
    pub fn exit(code: i32, message: impl Into<String>) -> Self {
        Self::Exit {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a deliberate exit request rather than a failure.
    pub fn is_exit_request(&self) -> bool {
        matches!(self, Self::Exit { .. })
    }

    /// Exit code carried by an exit request.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exit { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if load directives caused this error.
    pub fn is_directive_failure(&self) -> bool {
        matches!(
            self,
            Self::MalformedDirective { .. }
                | Self::UnknownPlugin { .. }
                | Self::DeniedPlugin { .. }
                | Self::DirectiveDeadlock { .. }
        )
    }
}

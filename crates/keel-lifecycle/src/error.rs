//! Lifecycle error types

use keel_registry::RegistryError;
use keel_types::ComponentError;
use thiserror::Error;

/// Structural failures of a dependency walk
///
/// These describe a defect in the catalog, never a transient readiness
/// state. A dependency that is merely not ready is recorded in the trace.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("dependency cycle found for {component}: {dependency}")]
    Cycle {
        component: String,
        dependency: String,
    },

    #[error("declared dependency not found for {component}: {dependency}")]
    MissingDependency {
        component: String,
        dependency: String,
    },

    #[error("component catalog unavailable: {0}")]
    Registry(#[from] RegistryError),
}

impl ResolveError {
    /// Component whose declaration triggered the error, if any
    pub fn component(&self) -> Option<&str> {
        match self {
            Self::Cycle { component, .. } | Self::MissingDependency { component, .. } => {
                Some(component)
            }
            Self::Registry(_) => None,
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{phase} failed for {component}: {source}")]
    Hook {
        component: String,
        phase: &'static str,
        #[source]
        source: ComponentError,
    },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LifecycleError {
    pub fn hook(component: impl Into<String>, phase: &'static str, source: ComponentError) -> Self {
        Self::Hook {
            component: component.into(),
            phase,
            source,
        }
    }

    /// The hook error exactly as the component returned it
    pub fn hook_error(&self) -> Option<&ComponentError> {
        match self {
            Self::Hook { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for LifecycleError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;

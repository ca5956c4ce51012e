//! Component hook error types
//!
//! These errors are produced by the collaborators behind a component's
//! lifecycle hooks. The core never retries or rewrites them: they are handed
//! back to the reconciliation driver unmodified.

use thiserror::Error;

/// Errors raised by component lifecycle hooks
#[derive(Debug, Error)]
pub enum ComponentError {
    /// A hook reported a failure
    #[error("{hook} hook failed for {component}: {reason}")]
    HookFailed {
        component: String,
        hook: String,
        reason: String,
    },

    /// The package installer rejected an operation
    #[error("Installer error: {0}")]
    Installer(String),

    /// The operation observed the context's cancellation flag
    #[error("Operation cancelled")]
    Cancelled,
}

impl ComponentError {
    /// Create a hook failure for a component
    pub fn hook_failed(
        component: impl Into<String>,
        hook: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::HookFailed {
            component: component.into(),
            hook: hook.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for component hooks
pub type Result<T> = std::result::Result<T, ComponentError>;

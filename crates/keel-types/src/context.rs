//! Context threaded through every component call
//!
//! The context carries identity for logging and an optional cancellation
//! flag. The core never imposes timeouts of its own; collaborators behind the
//! hooks decide whether and how to honour cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

/// Shared cancellation flag
///
/// Cloning shares the flag; cancelling any clone is visible to all of them.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Context for a component lifecycle operation
#[derive(Debug, Clone)]
pub struct ComponentContext {
    /// Unique id of the reconciliation pass that created this context
    pub request_id: Uuid,
    /// Who is driving the operation (controller name, test name, ...)
    pub actor: String,
    /// When set, hooks must not mutate cluster state
    pub dry_run: bool,
    /// Context creation time
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Platform version being reconciled towards, if known
    pub target_version: Option<String>,
    /// Cancellation flag hooks may observe
    pub cancellation: CancellationFlag,
}

impl ComponentContext {
    /// Create a new context for an actor
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            actor: actor.into(),
            dry_run: false,
            timestamp: chrono::Utc::now(),
            target_version: None,
            cancellation: CancellationFlag::new(),
        }
    }

    /// Context for the reconciliation controller
    pub fn controller() -> Self {
        Self::new("reconciler")
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_target_version(mut self, version: impl Into<String>) -> Self {
        self.target_version = Some(version.into());
        self
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Derive a context for a nested pass, keeping identity and cancellation
    pub fn child(&self) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            ..self.clone()
        }
    }
}

impl Default for ComponentContext {
    fn default() -> Self {
        Self::controller()
    }
}

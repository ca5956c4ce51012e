//! Lifecycle states for platform components
//!
//! ```text
//! NotInstalled -> Installing -> Ready -> Upgrading -> Ready
//! ```
//!
//! Admission into `Installing` and `Upgrading` is gated on every dependency
//! being ready at the moment of the transition.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a single component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Nothing applied yet
    #[default]
    NotInstalled,
    /// Install hooks ran; waiting for the component to report ready
    Installing,
    /// Installed and operational
    Ready,
    /// Upgrade hooks ran; waiting for the component to report ready again
    Upgrading,
    /// Excluded from reconciliation
    Disabled,
}

impl LifecycleState {
    /// States whose entry requires the readiness gate to be open
    pub fn is_gated(&self) -> bool {
        matches!(self, LifecycleState::Installing | LifecycleState::Upgrading)
    }

    /// Whether a transition from `self` to `next` is permitted
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (NotInstalled, Installing)
                | (Installing, Ready)
                | (Installing, NotInstalled)
                | (Ready, Upgrading)
                | (Upgrading, Ready)
                | (_, Disabled)
                | (Disabled, NotInstalled)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::NotInstalled => write!(f, "NotInstalled"),
            LifecycleState::Installing => write!(f, "Installing"),
            LifecycleState::Ready => write!(f, "Ready"),
            LifecycleState::Upgrading => write!(f, "Upgrading"),
            LifecycleState::Disabled => write!(f, "Disabled"),
        }
    }
}

/// Observed lifecycle status of a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// Component name
    pub name: String,

    /// Current lifecycle state
    pub state: LifecycleState,

    /// Version that last reached Ready
    pub installed_version: Option<String>,

    /// Version the controller is reconciling towards
    pub desired_version: Option<String>,

    /// Version handed to the hooks of the install or upgrade in flight
    #[serde(default)]
    pub applying_version: Option<String>,

    /// Message of the last hook failure, cleared on the next successful transition
    pub last_error: Option<String>,

    /// Number of state transitions so far
    pub transitions: u64,

    /// Time of the last state transition
    pub last_transition: chrono::DateTime<chrono::Utc>,
}

impl ComponentStatus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: LifecycleState::NotInstalled,
            installed_version: None,
            desired_version: None,
            applying_version: None,
            last_error: None,
            transitions: 0,
            last_transition: chrono::Utc::now(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == LifecycleState::Ready
    }

    pub fn is_disabled(&self) -> bool {
        self.state == LifecycleState::Disabled
    }

    /// Whether the desired version differs from what is installed
    pub fn upgrade_pending(&self) -> bool {
        match (&self.desired_version, &self.installed_version) {
            (Some(desired), Some(installed)) => desired != installed,
            (Some(_), None) => self.state == LifecycleState::Ready,
            _ => false,
        }
    }
}

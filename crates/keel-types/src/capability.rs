//! Optional lifecycle hooks a component may provide.
//!
//! Every component answers the required contract (name, dependencies,
//! readiness, install, upgrade). Everything else is optional, and a component
//! advertises which optional hooks it actually implements through
//! [`Capabilities`]. Callers consult the set before invoking a hook; an absent
//! capability is the common case and never an error.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An optional lifecycle hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Preparation run before the first install.
    PreInstall,
    /// Computes value overrides applied on install/upgrade.
    Overrides,
    /// Verification run after install.
    PostInstall,
    /// Migration run before an upgrade.
    PreUpgrade,
    /// Resolves the namespace the component is installed into.
    ResolveNamespace,
    /// Bespoke readiness probe instead of the installer's release status.
    ReadyProbe,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::PreInstall => write!(f, "pre-install"),
            Capability::Overrides => write!(f, "overrides"),
            Capability::PostInstall => write!(f, "post-install"),
            Capability::PreUpgrade => write!(f, "pre-upgrade"),
            Capability::ResolveNamespace => write!(f, "resolve-namespace"),
            Capability::ReadyProbe => write!(f, "ready-probe"),
        }
    }
}

/// Set of optional hooks present on a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities(BTreeSet<Capability>);

impl Capabilities {
    /// An empty set: the component only implements the required contract.
    pub fn none() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

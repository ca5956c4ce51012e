//! The component capability contract
//!
//! A component is one independently installable subsystem of the managed
//! platform. Catalog entries are polymorphic over this trait: a generic
//! packaged-application adapter covers most of them, specialized adapters
//! cover components with bespoke install procedures.
//!
//! Dependencies are declared by name, not by reference, so a catalog can be
//! rebuilt or swapped wholesale without rewiring anything.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capability::Capabilities;
use crate::context::ComponentContext;
use crate::error::Result;

/// A component shared between the catalog, the resolver and the driver
pub type SharedComponent = Arc<dyn Component>;

/// A single `key=value` override applied when installing a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueOverride {
    pub key: String,
    pub value: String,
}

impl ValueOverride {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ValueOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Capability contract shared by every catalog entry
///
/// `install` and `upgrade` must be idempotent: installing an installed
/// component, or upgrading one already at the target version, is a safe
/// reapplication and never fails with "already exists".
///
/// `is_ready` must be cheap and free of side effects. It is called on every
/// reconciliation tick and concurrently by every dependent of the component.
#[async_trait]
pub trait Component: Send + Sync {
    /// Unique name, used as the catalog key and in dependency lists.
    fn name(&self) -> &str;

    /// Names of the components that must be ready first, in declared order.
    fn dependencies(&self) -> &[String];

    /// Which optional hooks this component implements.
    fn capabilities(&self) -> Capabilities {
        Capabilities::none()
    }

    /// Probe current operational status.
    async fn is_ready(&self, ctx: &ComponentContext) -> bool;

    /// Install the component.
    async fn install(&self, ctx: &ComponentContext) -> Result<()>;

    /// Upgrade the component to the version carried by the context.
    async fn upgrade(&self, ctx: &ComponentContext) -> Result<()>;

    /// Preparation before the first install.
    async fn pre_install(&self, _ctx: &ComponentContext) -> Result<()> {
        Ok(())
    }

    /// Value overrides applied on install and upgrade.
    async fn overrides(&self, _ctx: &ComponentContext) -> Result<Vec<ValueOverride>> {
        Ok(Vec::new())
    }

    /// Verification after install.
    async fn post_install(&self, _ctx: &ComponentContext) -> Result<()> {
        Ok(())
    }

    /// Migration before an upgrade.
    async fn pre_upgrade(&self, _ctx: &ComponentContext) -> Result<()> {
        Ok(())
    }

    /// Namespace override; `None` keeps the component's own namespace.
    async fn resolve_namespace(&self, _ctx: &ComponentContext) -> Option<String> {
        None
    }
}

impl fmt::Debug for dyn Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name())
            .field("dependencies", &self.dependencies())
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;

    struct Bare {
        deps: Vec<String>,
    }

    #[async_trait]
    impl Component for Bare {
        fn name(&self) -> &str {
            "bare"
        }

        fn dependencies(&self) -> &[String] {
            &self.deps
        }

        async fn is_ready(&self, _ctx: &ComponentContext) -> bool {
            true
        }

        async fn install(&self, _ctx: &ComponentContext) -> Result<()> {
            Ok(())
        }

        async fn upgrade(&self, _ctx: &ComponentContext) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_optional_hooks_default_to_noop() {
        let component: SharedComponent = Arc::new(Bare { deps: vec![] });
        let ctx = ComponentContext::new("test");

        assert!(component.capabilities().is_empty());
        assert!(!component.capabilities().has(Capability::PreInstall));
        assert!(component.pre_install(&ctx).await.is_ok());
        assert!(component.post_install(&ctx).await.is_ok());
        assert!(component.pre_upgrade(&ctx).await.is_ok());
        assert!(component.overrides(&ctx).await.unwrap().is_empty());
        assert!(component.resolve_namespace(&ctx).await.is_none());
    }

    #[test]
    fn test_debug_shows_name_and_dependencies() {
        let component: SharedComponent = Arc::new(Bare {
            deps: vec!["istio".into()],
        });
        let rendered = format!("{:?}", component);
        assert!(rendered.contains("bare"));
        assert!(rendered.contains("istio"));
    }

    #[test]
    fn test_override_display() {
        let ov = ValueOverride::new("global.imagePullSecrets[0]", "registry-secret");
        assert_eq!(ov.to_string(), "global.imagePullSecrets[0]=registry-secret");
    }
}

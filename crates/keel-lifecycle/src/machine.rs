//! Per-component lifecycle state machine
//!
//! ```text
//! NotInstalled --(gate open)--> Installing --(ready)--> Ready
//! Ready --(new version, gate open)--> Upgrading --(ready)--> Ready
//! ```
//!
//! One call to [`ComponentLifecycle::step`] performs at most one transition.
//! The gate is consulted on every admission and never cached. Hooks are not
//! retried here; a failed hook is returned to the caller and retried on a
//! later tick.

use chrono::Utc;
use keel_types::{
    Capability, ComponentContext, ComponentError, ComponentStatus, LifecycleState,
    SharedComponent,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{LifecycleError, Result};
use crate::gate::ReadinessGate;

/// What a single step did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// The gate was closed; no hooks ran
    ///
    /// `error` carries the resolution failure when the gate failed closed on
    /// a cycle or an undeclared dependency rather than on readiness.
    Blocked {
        waiting_on: Vec<String>,
        error: Option<String>,
    },
    /// Install hooks ran and the component entered `Installing`
    InstallStarted,
    /// The component reported ready after installing
    Installed,
    /// Upgrade hooks ran and the component entered `Upgrading`
    UpgradeStarted,
    /// The component reported ready after upgrading
    Upgraded,
    /// Hooks already ran; the component is not ready yet
    Waiting,
    /// Nothing to do
    Unchanged,
    /// The component is disabled
    Skipped,
}

impl Transition {
    /// Whether the step changed the lifecycle state
    pub fn is_progress(&self) -> bool {
        matches!(
            self,
            Transition::InstallStarted
                | Transition::Installed
                | Transition::UpgradeStarted
                | Transition::Upgraded
        )
    }
}

/// Lifecycle of one component
#[derive(Debug, Clone)]
pub struct ComponentLifecycle {
    status: ComponentStatus,
}

impl ComponentLifecycle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::new(name),
        }
    }

    /// Resume from a previously observed status
    pub fn from_status(status: ComponentStatus) -> Self {
        Self { status }
    }

    pub fn status(&self) -> &ComponentStatus {
        &self.status
    }

    pub fn state(&self) -> LifecycleState {
        self.status.state
    }

    /// Set the version to reconcile towards
    pub fn request_upgrade(&mut self, version: impl Into<String>) {
        self.status.desired_version = Some(version.into());
    }

    pub fn disable(&mut self) {
        if self.status.state != LifecycleState::Disabled {
            self.enter(LifecycleState::Disabled);
        }
    }

    /// Re-enable a disabled component; it starts over from `NotInstalled`
    pub fn enable(&mut self) {
        if self.status.state == LifecycleState::Disabled {
            self.enter(LifecycleState::NotInstalled);
        }
    }

    /// Advance by at most one transition
    pub async fn step(
        &mut self,
        component: &SharedComponent,
        ctx: &ComponentContext,
        gate: &ReadinessGate,
    ) -> Result<Transition> {
        match self.status.state {
            LifecycleState::Disabled => Ok(Transition::Skipped),
            LifecycleState::NotInstalled => self.try_install(component, ctx, gate).await,
            LifecycleState::Installing => Ok(self.await_ready(component, ctx, Transition::Installed).await),
            LifecycleState::Ready => {
                if self.status.upgrade_pending() {
                    self.try_upgrade(component, ctx, gate).await
                } else {
                    Ok(Transition::Unchanged)
                }
            }
            LifecycleState::Upgrading => Ok(self.await_ready(component, ctx, Transition::Upgraded).await),
        }
    }

    async fn admit(
        &self,
        component: &SharedComponent,
        ctx: &ComponentContext,
        gate: &ReadinessGate,
    ) -> Option<Transition> {
        let decision = gate.evaluate(component, ctx).await;
        if decision.is_open() {
            return None;
        }
        let waiting_on: Vec<String> = decision.blocked_on().into_iter().map(String::from).collect();
        let error = decision.error().map(|e| e.to_string());
        debug!(component = %component.name(), waiting_on = ?waiting_on, error = ?error, "Dependencies not met");
        Some(Transition::Blocked { waiting_on, error })
    }

    async fn try_install(
        &mut self,
        component: &SharedComponent,
        ctx: &ComponentContext,
        gate: &ReadinessGate,
    ) -> Result<Transition> {
        if let Some(blocked) = self.admit(component, ctx, gate).await {
            return Ok(blocked);
        }

        self.enter(LifecycleState::Installing);
        let ctx = self.begin_apply(ctx);
        if let Err(e) = run_install(component, &ctx).await {
            self.fail(LifecycleState::NotInstalled, &e);
            return Err(e);
        }
        Ok(Transition::InstallStarted)
    }

    async fn try_upgrade(
        &mut self,
        component: &SharedComponent,
        ctx: &ComponentContext,
        gate: &ReadinessGate,
    ) -> Result<Transition> {
        if let Some(blocked) = self.admit(component, ctx, gate).await {
            return Ok(blocked);
        }

        self.enter(LifecycleState::Upgrading);
        let ctx = self.begin_apply(ctx);
        if let Err(e) = run_upgrade(component, &ctx).await {
            self.fail(LifecycleState::Ready, &e);
            return Err(e);
        }
        Ok(Transition::UpgradeStarted)
    }

    async fn await_ready(
        &mut self,
        component: &SharedComponent,
        ctx: &ComponentContext,
        done: Transition,
    ) -> Transition {
        if !component.is_ready(ctx).await {
            return Transition::Waiting;
        }
        self.status.installed_version = self.status.applying_version.take();
        self.status.last_error = None;
        self.enter(LifecycleState::Ready);
        done
    }

    /// Pin the version the hooks are about to apply
    fn begin_apply(&mut self, ctx: &ComponentContext) -> ComponentContext {
        self.status.applying_version = self.status.desired_version.clone();
        match &self.status.applying_version {
            Some(version) => ctx.child().with_target_version(version.clone()),
            None => ctx.child(),
        }
    }

    fn enter(&mut self, next: LifecycleState) {
        let from = self.status.state;
        if !from.can_transition_to(next) {
            warn!(component = %self.status.name, from = %from, to = %next, "Unexpected lifecycle transition");
        }
        self.status.state = next;
        self.status.transitions += 1;
        self.status.last_transition = Utc::now();
        info!(component = %self.status.name, from = %from, to = %next, "Lifecycle transition");
    }

    fn fail(&mut self, fallback: LifecycleState, error: &LifecycleError) {
        self.status.last_error = Some(error.to_string());
        self.status.applying_version = None;
        self.enter(fallback);
    }
}

async fn run_install(component: &SharedComponent, ctx: &ComponentContext) -> Result<()> {
    let caps = component.capabilities();
    if caps.has(Capability::PreInstall) {
        hook(component, "pre-install", component.pre_install(ctx).await)?;
    }
    hook(component, "install", component.install(ctx).await)?;
    if caps.has(Capability::PostInstall) {
        hook(component, "post-install", component.post_install(ctx).await)?;
    }
    Ok(())
}

async fn run_upgrade(component: &SharedComponent, ctx: &ComponentContext) -> Result<()> {
    if component.capabilities().has(Capability::PreUpgrade) {
        hook(component, "pre-upgrade", component.pre_upgrade(ctx).await)?;
    }
    hook(component, "upgrade", component.upgrade(ctx).await)
}

fn hook(
    component: &SharedComponent,
    phase: &'static str,
    result: std::result::Result<(), ComponentError>,
) -> Result<()> {
    result.map_err(|source| LifecycleError::hook(component.name(), phase, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::RevisitPolicy;
    use keel_registry::{ComponentRegistry, FnCatalogSource};
    use keel_types::testing::{share, StubComponent};
    use std::sync::Arc;

    struct Fixture {
        mesh: Arc<StubComponent>,
        app: Arc<StubComponent>,
        gate: ReadinessGate,
    }

    fn fixture() -> Fixture {
        let mesh = StubComponent::new("mesh").ready_after_install().shared();
        let app = StubComponent::new("app")
            .depends_on(["mesh"])
            .with_capability(Capability::PreInstall)
            .with_capability(Capability::PreUpgrade)
            .ready_after_install()
            .shared();
        let (m, a) = (mesh.clone(), app.clone());
        let registry = Arc::new(ComponentRegistry::new(FnCatalogSource::shared("test", move || {
            vec![share(&m), share(&a)]
        })));
        Fixture {
            mesh,
            app,
            gate: ReadinessGate::for_registry(registry, RevisitPolicy::Strict),
        }
    }

    #[tokio::test]
    async fn test_install_waits_for_dependencies() {
        let f = fixture();
        let app = share(&f.app);
        let ctx = ComponentContext::new("test");
        let mut lifecycle = ComponentLifecycle::new("app");

        let step = lifecycle.step(&app, &ctx, &f.gate).await.unwrap();
        assert_eq!(
            step,
            Transition::Blocked {
                waiting_on: vec!["mesh".into()],
                error: None,
            }
        );
        assert_eq!(lifecycle.state(), LifecycleState::NotInstalled);
        assert_eq!(f.app.install_calls(), 0);

        f.mesh.set_ready(true);
        assert_eq!(lifecycle.step(&app, &ctx, &f.gate).await.unwrap(), Transition::InstallStarted);
        assert_eq!(lifecycle.state(), LifecycleState::Installing);
        assert_eq!(f.app.hook_log(), vec!["pre_install", "install"]);

        assert_eq!(lifecycle.step(&app, &ctx, &f.gate).await.unwrap(), Transition::Installed);
        assert_eq!(lifecycle.state(), LifecycleState::Ready);
        assert_eq!(lifecycle.step(&app, &ctx, &f.gate).await.unwrap(), Transition::Unchanged);
    }

    #[tokio::test]
    async fn test_installing_waits_for_readiness() {
        let f = fixture();
        let mesh = share(&f.mesh);
        let ctx = ComponentContext::new("test");
        let mut lifecycle = ComponentLifecycle::new("mesh");

        lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap();
        f.mesh.set_ready(false);
        assert_eq!(lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap(), Transition::Waiting);
        assert_eq!(lifecycle.state(), LifecycleState::Installing);
    }

    #[tokio::test]
    async fn test_failed_install_returns_to_not_installed() {
        let f = fixture();
        let mesh = share(&f.mesh);
        let ctx = ComponentContext::new("test");
        let mut lifecycle = ComponentLifecycle::new("mesh");

        f.mesh.set_fail_install(true);
        let err = lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap_err();
        assert!(matches!(
            err.hook_error(),
            Some(ComponentError::HookFailed { hook, .. }) if hook == "install"
        ));
        assert_eq!(lifecycle.state(), LifecycleState::NotInstalled);
        assert!(lifecycle.status().last_error.is_some());

        f.mesh.set_fail_install(false);
        assert_eq!(lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap(), Transition::InstallStarted);
        assert_eq!(f.mesh.install_calls(), 2);
    }

    #[tokio::test]
    async fn test_upgrade_is_gated_and_tracks_version() {
        let f = fixture();
        let app = share(&f.app);
        let ctx = ComponentContext::new("test");
        let mut lifecycle = ComponentLifecycle::new("app");
        lifecycle.request_upgrade("1.0.0");

        f.mesh.set_ready(true);
        lifecycle.step(&app, &ctx, &f.gate).await.unwrap();
        lifecycle.step(&app, &ctx, &f.gate).await.unwrap();
        assert_eq!(lifecycle.status().installed_version.as_deref(), Some("1.0.0"));

        lifecycle.request_upgrade("1.1.0");
        f.mesh.set_ready(false);
        assert!(matches!(
            lifecycle.step(&app, &ctx, &f.gate).await.unwrap(),
            Transition::Blocked { .. }
        ));
        assert_eq!(lifecycle.state(), LifecycleState::Ready);

        f.mesh.set_ready(true);
        assert_eq!(lifecycle.step(&app, &ctx, &f.gate).await.unwrap(), Transition::UpgradeStarted);
        assert_eq!(f.app.hook_log(), vec!["pre_install", "install", "pre_upgrade", "upgrade"]);
        assert_eq!(lifecycle.step(&app, &ctx, &f.gate).await.unwrap(), Transition::Upgraded);
        assert_eq!(lifecycle.status().installed_version.as_deref(), Some("1.1.0"));
        assert!(!lifecycle.status().upgrade_pending());
    }

    #[tokio::test]
    async fn test_failed_upgrade_returns_to_ready() {
        let f = fixture();
        let mesh = share(&f.mesh);
        let ctx = ComponentContext::new("test");
        let mut lifecycle = ComponentLifecycle::new("mesh");

        lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap();
        lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap();
        lifecycle.request_upgrade("2.0.0");
        f.mesh.set_fail_upgrade(true);

        assert!(lifecycle.step(&mesh, &ctx, &f.gate).await.is_err());
        assert_eq!(lifecycle.state(), LifecycleState::Ready);
        assert!(lifecycle.status().upgrade_pending());
    }

    #[tokio::test]
    async fn test_version_requested_mid_install_is_upgraded_later() {
        let f = fixture();
        let mesh = share(&f.mesh);
        let ctx = ComponentContext::new("test");
        let mut lifecycle = ComponentLifecycle::new("mesh");
        lifecycle.request_upgrade("1.0.0");

        assert_eq!(lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap(), Transition::InstallStarted);
        lifecycle.request_upgrade("1.1.0");

        assert_eq!(lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap(), Transition::Installed);
        assert_eq!(lifecycle.status().installed_version.as_deref(), Some("1.0.0"));
        assert!(lifecycle.status().upgrade_pending());

        assert_eq!(lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap(), Transition::UpgradeStarted);
        assert_eq!(lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap(), Transition::Upgraded);
        assert_eq!(lifecycle.status().installed_version.as_deref(), Some("1.1.0"));
        assert_eq!(f.mesh.upgrade_calls(), 1);
        assert_eq!(lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap(), Transition::Unchanged);
    }

    #[tokio::test]
    async fn test_version_requested_mid_upgrade_is_not_marked_installed() {
        let f = fixture();
        let mesh = share(&f.mesh);
        let ctx = ComponentContext::new("test");
        let mut lifecycle = ComponentLifecycle::new("mesh");
        lifecycle.request_upgrade("1.0.0");
        lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap();
        lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap();

        lifecycle.request_upgrade("2.0.0");
        assert_eq!(lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap(), Transition::UpgradeStarted);
        lifecycle.request_upgrade("3.0.0");
        assert_eq!(lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap(), Transition::Upgraded);
        assert_eq!(lifecycle.status().installed_version.as_deref(), Some("2.0.0"));

        assert_eq!(lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap(), Transition::UpgradeStarted);
        assert_eq!(f.mesh.upgrade_calls(), 2);
    }

    #[tokio::test]
    async fn test_unresolvable_graph_reports_the_error() {
        let app = StubComponent::new("app").depends_on(["ghost"]).shared();
        let a = app.clone();
        let registry = Arc::new(ComponentRegistry::new(FnCatalogSource::shared("test", move || {
            vec![share(&a)]
        })));
        let gate = ReadinessGate::for_registry(registry, RevisitPolicy::Strict);
        let mut lifecycle = ComponentLifecycle::new("app");

        let step = lifecycle
            .step(&share(&app), &ComponentContext::new("test"), &gate)
            .await
            .unwrap();
        assert_eq!(
            step,
            Transition::Blocked {
                waiting_on: vec![],
                error: Some("declared dependency not found for app: ghost".into()),
            }
        );
        assert_eq!(app.install_calls(), 0);
    }

    #[tokio::test]
    async fn test_disabled_is_skipped() {
        let f = fixture();
        let mesh = share(&f.mesh);
        let ctx = ComponentContext::new("test");
        let mut lifecycle = ComponentLifecycle::new("mesh");

        lifecycle.disable();
        assert_eq!(lifecycle.step(&mesh, &ctx, &f.gate).await.unwrap(), Transition::Skipped);
        assert_eq!(f.mesh.install_calls(), 0);

        lifecycle.enable();
        assert_eq!(lifecycle.state(), LifecycleState::NotInstalled);
    }
}

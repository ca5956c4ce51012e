//! Generic packaged-application component
//!
//! Most catalog entries are a package release: a chart directory, a target
//! namespace, value files and overrides, applied with upgrade-or-install
//! semantics so reapplying is always safe. Component-specific behavior plugs
//! in through [`PackageHooks`]; a package without hooks is still a complete
//! component whose readiness is the installer's release status.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use keel_types::{
    Capabilities, Capability, ClusterStateReader, Component, ComponentContext, ComponentError,
    PackageInstaller, PackageRelease, ReleaseStatus, Result, ValueOverride, WorkloadRef,
};
use tracing::{debug, instrument, warn};

/// Identity of the package a hook is invoked for
#[derive(Debug, Clone, Copy)]
pub struct PackageInfo<'a> {
    pub release_name: &'a str,
    pub namespace: &'a str,
}

/// Component-specific hooks for a package
///
/// Only hooks listed in [`PackageHooks::capabilities`] are ever invoked.
#[async_trait]
pub trait PackageHooks: Send + Sync {
    /// Hooks this implementation provides
    fn capabilities(&self) -> Capabilities;

    async fn pre_install(&self, _ctx: &ComponentContext, _pkg: PackageInfo<'_>) -> Result<()> {
        Ok(())
    }

    async fn overrides(
        &self,
        _ctx: &ComponentContext,
        _pkg: PackageInfo<'_>,
    ) -> Result<Vec<ValueOverride>> {
        Ok(Vec::new())
    }

    async fn post_install(&self, _ctx: &ComponentContext, _pkg: PackageInfo<'_>) -> Result<()> {
        Ok(())
    }

    async fn pre_upgrade(&self, _ctx: &ComponentContext, _pkg: PackageInfo<'_>) -> Result<()> {
        Ok(())
    }

    async fn resolve_namespace(
        &self,
        _ctx: &ComponentContext,
        _pkg: PackageInfo<'_>,
    ) -> Option<String> {
        None
    }

    async fn is_ready(&self, _ctx: &ComponentContext, _pkg: PackageInfo<'_>) -> bool {
        false
    }
}

/// Package without component-specific hooks
pub struct NoHooks;

#[async_trait]
impl PackageHooks for NoHooks {
    fn capabilities(&self) -> Capabilities {
        Capabilities::none()
    }
}

/// Declarative hooks covering the common package needs
///
/// Each configured piece switches on the matching capability:
/// - ready workloads: [`Capability::ReadyProbe`]
/// - namespace labels: [`Capability::PreInstall`] (namespace created and labelled)
/// - overrides: [`Capability::Overrides`]
/// - release verification: [`Capability::PostInstall`]
/// - upgrade manifest: [`Capability::PreUpgrade`] (e.g. CRDs applied before upgrade)
/// - namespace override: [`Capability::ResolveNamespace`]
pub struct StandardHooks {
    cluster: Arc<dyn ClusterStateReader>,
    installer: Arc<dyn PackageInstaller>,
    ready_workloads: Vec<WorkloadRef>,
    namespace_labels: Option<Vec<(String, String)>>,
    overrides: Vec<ValueOverride>,
    verify_release: bool,
    upgrade_manifest: Option<PathBuf>,
    namespace_override: Option<String>,
}

impl StandardHooks {
    pub fn new(cluster: Arc<dyn ClusterStateReader>, installer: Arc<dyn PackageInstaller>) -> Self {
        Self {
            cluster,
            installer,
            ready_workloads: Vec::new(),
            namespace_labels: None,
            overrides: Vec::new(),
            verify_release: false,
            upgrade_manifest: None,
            namespace_override: None,
        }
    }

    pub fn ready_when(mut self, workloads: impl IntoIterator<Item = WorkloadRef>) -> Self {
        self.ready_workloads.extend(workloads);
        self
    }

    pub fn ensure_namespace(mut self, labels: Vec<(String, String)>) -> Self {
        self.namespace_labels = Some(labels);
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push(ValueOverride::new(key, value));
        self
    }

    pub fn verify_release(mut self) -> Self {
        self.verify_release = true;
        self
    }

    pub fn apply_before_upgrade(mut self, manifest: impl Into<PathBuf>) -> Self {
        self.upgrade_manifest = Some(manifest.into());
        self
    }

    pub fn install_into(mut self, namespace: impl Into<String>) -> Self {
        self.namespace_override = Some(namespace.into());
        self
    }

    pub fn shared(self) -> Arc<dyn PackageHooks> {
        Arc::new(self)
    }
}

#[async_trait]
impl PackageHooks for StandardHooks {
    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::none();
        if !self.ready_workloads.is_empty() {
            caps.insert(Capability::ReadyProbe);
        }
        if self.namespace_labels.is_some() {
            caps.insert(Capability::PreInstall);
        }
        if !self.overrides.is_empty() {
            caps.insert(Capability::Overrides);
        }
        if self.verify_release {
            caps.insert(Capability::PostInstall);
        }
        if self.upgrade_manifest.is_some() {
            caps.insert(Capability::PreUpgrade);
        }
        if self.namespace_override.is_some() {
            caps.insert(Capability::ResolveNamespace);
        }
        caps
    }

    async fn pre_install(&self, ctx: &ComponentContext, pkg: PackageInfo<'_>) -> Result<()> {
        let Some(labels) = &self.namespace_labels else {
            return Ok(());
        };
        if ctx.dry_run {
            return Ok(());
        }
        self.installer.ensure_namespace(pkg.namespace, labels).await
    }

    async fn overrides(
        &self,
        _ctx: &ComponentContext,
        _pkg: PackageInfo<'_>,
    ) -> Result<Vec<ValueOverride>> {
        Ok(self.overrides.clone())
    }

    async fn post_install(&self, ctx: &ComponentContext, pkg: PackageInfo<'_>) -> Result<()> {
        if !self.verify_release || ctx.dry_run {
            return Ok(());
        }
        match self
            .installer
            .release_status(pkg.release_name, pkg.namespace)
            .await?
        {
            ReleaseStatus::Failed => Err(ComponentError::hook_failed(
                pkg.release_name,
                "post-install",
                "release reported failed after install",
            )),
            ReleaseStatus::NotFound => Err(ComponentError::hook_failed(
                pkg.release_name,
                "post-install",
                "release missing after install",
            )),
            ReleaseStatus::Pending | ReleaseStatus::Deployed => Ok(()),
        }
    }

    async fn pre_upgrade(&self, ctx: &ComponentContext, _pkg: PackageInfo<'_>) -> Result<()> {
        let Some(manifest) = &self.upgrade_manifest else {
            return Ok(());
        };
        if ctx.dry_run {
            return Ok(());
        }
        self.installer.apply_manifest(manifest, &[]).await
    }

    async fn resolve_namespace(
        &self,
        _ctx: &ComponentContext,
        _pkg: PackageInfo<'_>,
    ) -> Option<String> {
        self.namespace_override.clone()
    }

    async fn is_ready(&self, _ctx: &ComponentContext, pkg: PackageInfo<'_>) -> bool {
        for workload in &self.ready_workloads {
            match self.cluster.workload_ready(pkg.namespace, workload).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(component = pkg.release_name, workload = %workload, "Workload not ready");
                    return false;
                }
                Err(e) => {
                    warn!(
                        component = pkg.release_name,
                        workload = %workload,
                        error = %e,
                        "Readiness probe failed"
                    );
                    return false;
                }
            }
        }
        true
    }
}

/// A component installed as a package release
pub struct PackageComponent {
    release_name: String,
    chart_dir: PathBuf,
    chart_namespace: String,
    values_file: Option<PathBuf>,
    dependencies: Vec<String>,
    /// Set for operator-installed packages that need the pull secret injected
    image_pull_secret_key: Option<String>,
    image_pull_secret: Option<String>,
    hooks: Arc<dyn PackageHooks>,
    installer: Arc<dyn PackageInstaller>,
}

impl PackageComponent {
    pub fn new(
        release_name: impl Into<String>,
        chart_dir: impl Into<PathBuf>,
        chart_namespace: impl Into<String>,
        installer: Arc<dyn PackageInstaller>,
    ) -> Self {
        Self {
            release_name: release_name.into(),
            chart_dir: chart_dir.into(),
            chart_namespace: chart_namespace.into(),
            values_file: None,
            dependencies: Vec::new(),
            image_pull_secret_key: None,
            image_pull_secret: None,
            hooks: Arc::new(NoHooks),
            installer,
        }
    }

    pub fn values_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.values_file = Some(path.into());
        self
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Mark as operator-installed, injecting `secret` under `key` when set
    pub fn operator_install(mut self, key: impl Into<String>, secret: Option<String>) -> Self {
        self.image_pull_secret_key = Some(key.into());
        self.image_pull_secret = secret;
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn PackageHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn chart_namespace(&self) -> &str {
        &self.chart_namespace
    }

    pub fn chart_dir(&self) -> &std::path::Path {
        &self.chart_dir
    }

    fn info<'a>(&'a self, namespace: &'a str) -> PackageInfo<'a> {
        PackageInfo {
            release_name: &self.release_name,
            namespace,
        }
    }

    fn has(&self, capability: Capability) -> bool {
        self.hooks.capabilities().has(capability)
    }

    async fn namespace(&self, ctx: &ComponentContext) -> String {
        if self.has(Capability::ResolveNamespace) {
            if let Some(ns) = self
                .hooks
                .resolve_namespace(ctx, self.info(&self.chart_namespace))
                .await
            {
                return ns;
            }
        }
        self.chart_namespace.clone()
    }

    async fn release(&self, ctx: &ComponentContext) -> Result<PackageRelease> {
        let namespace = self.namespace(ctx).await;
        let overrides = self.collect_overrides(ctx, &namespace).await?;
        Ok(PackageRelease {
            release_name: self.release_name.clone(),
            namespace,
            chart_dir: self.chart_dir.clone(),
            values_files: self.values_file.iter().cloned().collect(),
            overrides,
            dry_run: ctx.dry_run,
        })
    }

    async fn collect_overrides(
        &self,
        ctx: &ComponentContext,
        namespace: &str,
    ) -> Result<Vec<ValueOverride>> {
        let mut overrides = Vec::new();
        if let (Some(key), Some(secret)) = (&self.image_pull_secret_key, &self.image_pull_secret) {
            overrides.push(ValueOverride::new(key.clone(), secret.clone()));
        }
        if self.has(Capability::Overrides) {
            overrides.extend(self.hooks.overrides(ctx, self.info(namespace)).await?);
        }
        Ok(overrides)
    }

    async fn apply(&self, ctx: &ComponentContext) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(ComponentError::Cancelled);
        }
        let release = self.release(ctx).await?;
        debug!(
            component = %self.release_name,
            namespace = %release.namespace,
            overrides = release.overrides.len(),
            dry_run = release.dry_run,
            "Applying package release"
        );
        self.installer.upgrade_install(&release).await
    }
}

#[async_trait]
impl Component for PackageComponent {
    fn name(&self) -> &str {
        &self.release_name
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn capabilities(&self) -> Capabilities {
        self.hooks.capabilities()
    }

    async fn is_ready(&self, ctx: &ComponentContext) -> bool {
        let namespace = self.namespace(ctx).await;
        if self.has(Capability::ReadyProbe) {
            return self.hooks.is_ready(ctx, self.info(&namespace)).await;
        }
        match self
            .installer
            .release_status(&self.release_name, &namespace)
            .await
        {
            Ok(status) => status.is_deployed(),
            Err(e) => {
                warn!(component = %self.release_name, error = %e, "Release status unavailable");
                false
            }
        }
    }

    #[instrument(skip(self, ctx), fields(component = %self.release_name))]
    async fn install(&self, ctx: &ComponentContext) -> Result<()> {
        self.apply(ctx).await
    }

    #[instrument(skip(self, ctx), fields(component = %self.release_name))]
    async fn upgrade(&self, ctx: &ComponentContext) -> Result<()> {
        self.apply(ctx).await
    }

    async fn pre_install(&self, ctx: &ComponentContext) -> Result<()> {
        let namespace = self.namespace(ctx).await;
        self.hooks.pre_install(ctx, self.info(&namespace)).await
    }

    async fn overrides(&self, ctx: &ComponentContext) -> Result<Vec<ValueOverride>> {
        let namespace = self.namespace(ctx).await;
        self.collect_overrides(ctx, &namespace).await
    }

    async fn post_install(&self, ctx: &ComponentContext) -> Result<()> {
        let namespace = self.namespace(ctx).await;
        self.hooks.post_install(ctx, self.info(&namespace)).await
    }

    async fn pre_upgrade(&self, ctx: &ComponentContext) -> Result<()> {
        let namespace = self.namespace(ctx).await;
        self.hooks.pre_upgrade(ctx, self.info(&namespace)).await
    }

    async fn resolve_namespace(&self, ctx: &ComponentContext) -> Option<String> {
        if self.has(Capability::ResolveNamespace) {
            Some(self.namespace(ctx).await)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_types::testing::InMemoryCluster;

    fn cluster() -> Arc<InMemoryCluster> {
        Arc::new(InMemoryCluster::new())
    }

    #[tokio::test]
    async fn test_install_is_upgrade_install() {
        let cluster = cluster();
        let component = PackageComponent::new("rancher", "/charts/rancher", "cattle-system", cluster.clone())
            .values_file("/overrides/rancher-values.yaml");
        let ctx = ComponentContext::new("test");

        assert!(!component.is_ready(&ctx).await);
        component.install(&ctx).await.unwrap();
        component.install(&ctx).await.unwrap();

        let applied = cluster.applied_releases();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[0].namespace, "cattle-system");
        assert_eq!(applied[0].values_files, vec![PathBuf::from("/overrides/rancher-values.yaml")]);
        assert!(component.is_ready(&ctx).await);
    }

    #[tokio::test]
    async fn test_no_hooks_means_no_capabilities() {
        let component = PackageComponent::new("cert-manager", "/charts/cm", "cert-manager", cluster());
        assert!(component.capabilities().is_empty());
        assert!(component
            .resolve_namespace(&ComponentContext::new("test"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_ready_probe_uses_workloads() {
        let cluster = cluster();
        let hooks = StandardHooks::new(cluster.clone(), cluster.clone())
            .ready_when([WorkloadRef::deployment("coherence-operator")])
            .shared();
        let component =
            PackageComponent::new("coherence-operator", "/charts/coh", "keel-system", cluster.clone())
                .hooks(hooks);
        let ctx = ComponentContext::new("test");

        assert!(component.capabilities().has(Capability::ReadyProbe));
        component.install(&ctx).await.unwrap();
        assert!(!component.is_ready(&ctx).await);

        cluster.set_workload_ready("keel-system", "coherence-operator", true);
        assert!(component.is_ready(&ctx).await);
    }

    #[tokio::test]
    async fn test_overrides_merge_pull_secret_and_hooks() {
        let cluster = cluster();
        let hooks = StandardHooks::new(cluster.clone(), cluster.clone())
            .with_override("logLevel", "debug")
            .shared();
        let component =
            PackageComponent::new("weblogic-operator", "/charts/wls", "keel-system", cluster.clone())
                .operator_install("imagePullSecrets[0].name", Some("registry-secret".into()))
                .hooks(hooks);
        let ctx = ComponentContext::new("test");

        component.install(&ctx).await.unwrap();
        let applied = cluster.applied_releases();
        let rendered: Vec<String> = applied[0].overrides.iter().map(|o| o.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["imagePullSecrets[0].name=registry-secret", "logLevel=debug"]
        );
    }

    #[tokio::test]
    async fn test_pre_install_creates_namespace() {
        let cluster = cluster();
        let hooks = StandardHooks::new(cluster.clone(), cluster.clone())
            .ensure_namespace(vec![("keel.io/namespace".into(), "ingress-nginx".into())])
            .shared();
        let component =
            PackageComponent::new("ingress-controller", "/charts/nginx", "ingress-nginx", cluster.clone())
                .hooks(hooks);
        let ctx = ComponentContext::new("test");

        assert!(component.capabilities().has(Capability::PreInstall));
        component.pre_install(&ctx).await.unwrap();
        assert!(cluster.namespace_exists("ingress-nginx").await.unwrap());
    }

    #[tokio::test]
    async fn test_post_install_reports_failed_release() {
        let cluster = cluster();
        let hooks = StandardHooks::new(cluster.clone(), cluster.clone())
            .verify_release()
            .shared();
        let component = PackageComponent::new("oam", "/charts/oam", "keel-system", cluster.clone())
            .hooks(hooks);
        let ctx = ComponentContext::new("test");

        cluster.set_release_status("oam", "keel-system", ReleaseStatus::Failed);
        let err = component.post_install(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("post-install"));
    }

    #[tokio::test]
    async fn test_installer_error_is_returned_verbatim() {
        let cluster = cluster();
        cluster.fail_release("mysql");
        let component = PackageComponent::new("mysql", "/charts/mysql", "keycloak", cluster.clone());

        let err = component
            .install(&ComponentContext::new("test"))
            .await
            .unwrap_err();
        assert!(matches!(err, ComponentError::Installer(msg) if msg == "release mysql failed"));
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_apply() {
        let cluster = cluster();
        let component = PackageComponent::new("rancher", "/charts/rancher", "cattle-system", cluster.clone());
        let ctx = ComponentContext::new("test");
        ctx.cancellation.cancel();

        assert!(matches!(
            component.install(&ctx).await,
            Err(ComponentError::Cancelled)
        ));
        assert!(cluster.applied_releases().is_empty());
    }

    #[tokio::test]
    async fn test_resolved_namespace_is_used() {
        let cluster = cluster();
        let hooks = StandardHooks::new(cluster.clone(), cluster.clone())
            .install_into("platform-system")
            .shared();
        let component =
            PackageComponent::new("platform-core", "/charts/core", "keel-system", cluster.clone())
                .hooks(hooks);
        let ctx = ComponentContext::new("test");

        assert_eq!(
            component.resolve_namespace(&ctx).await.as_deref(),
            Some("platform-system")
        );
        component.install(&ctx).await.unwrap();
        assert_eq!(cluster.applied_releases()[0].namespace, "platform-system");
    }
}

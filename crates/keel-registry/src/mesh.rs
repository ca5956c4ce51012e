//! Service mesh component
//!
//! The mesh is not a package release: it is installed by applying an
//! operator manifest, and every system namespace that should carry sidecars
//! is labelled for injection once the control plane is in place.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use keel_types::{
    Capabilities, Capability, ClusterStateReader, Component, ComponentContext, ComponentError,
    PackageInstaller, Result, ValueOverride, WorkloadRef,
};
use tracing::{debug, info, instrument, warn};

pub const MESH_COMPONENT_NAME: &str = "istio";
pub const MESH_NAMESPACE: &str = "istio-system";
pub const INJECTION_LABEL: &str = "istio-injection";

const CONTROL_PLANE_DEPLOYMENTS: [&str; 3] =
    ["istiod", "istio-ingressgateway", "istio-egressgateway"];

/// Mesh installed from an operator manifest
pub struct MeshComponent {
    manifest: PathBuf,
    injected_namespaces: Vec<String>,
    image_pull_secret: Option<String>,
    dependencies: Vec<String>,
    cluster: Arc<dyn ClusterStateReader>,
    installer: Arc<dyn PackageInstaller>,
}

impl MeshComponent {
    pub fn new(
        manifest: impl Into<PathBuf>,
        injected_namespaces: Vec<String>,
        cluster: Arc<dyn ClusterStateReader>,
        installer: Arc<dyn PackageInstaller>,
    ) -> Self {
        Self {
            manifest: manifest.into(),
            injected_namespaces,
            image_pull_secret: None,
            dependencies: Vec::new(),
            cluster,
            installer,
        }
    }

    pub fn image_pull_secret(mut self, secret: Option<String>) -> Self {
        self.image_pull_secret = secret;
        self
    }

    pub fn manifest(&self) -> &std::path::Path {
        &self.manifest
    }

    fn manifest_overrides(&self) -> Vec<ValueOverride> {
        self.image_pull_secret
            .iter()
            .map(|secret| ValueOverride::new("values.global.imagePullSecrets[0]", secret.clone()))
            .collect()
    }

    async fn apply(&self, ctx: &ComponentContext) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(ComponentError::Cancelled);
        }
        if ctx.dry_run {
            debug!(manifest = %self.manifest.display(), "Dry run, skipping mesh manifest");
            return Ok(());
        }
        self.installer
            .apply_manifest(&self.manifest, &self.manifest_overrides())
            .await
    }
}

#[async_trait]
impl Component for MeshComponent {
    fn name(&self) -> &str {
        MESH_COMPONENT_NAME
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::none()
            .with(Capability::PostInstall)
            .with(Capability::ReadyProbe)
    }

    async fn is_ready(&self, _ctx: &ComponentContext) -> bool {
        for name in CONTROL_PLANE_DEPLOYMENTS {
            let workload = WorkloadRef::deployment(name);
            match self.cluster.workload_ready(MESH_NAMESPACE, &workload).await {
                Ok(true) => {}
                Ok(false) => return false,
                Err(e) => {
                    warn!(workload = %workload, error = %e, "Mesh readiness probe failed");
                    return false;
                }
            }
        }
        true
    }

    #[instrument(skip(self, ctx), fields(component = MESH_COMPONENT_NAME))]
    async fn install(&self, ctx: &ComponentContext) -> Result<()> {
        self.apply(ctx).await
    }

    #[instrument(skip(self, ctx), fields(component = MESH_COMPONENT_NAME))]
    async fn upgrade(&self, ctx: &ComponentContext) -> Result<()> {
        self.apply(ctx).await
    }

    async fn post_install(&self, ctx: &ComponentContext) -> Result<()> {
        if ctx.dry_run {
            return Ok(());
        }
        let labels = vec![(INJECTION_LABEL.to_string(), "enabled".to_string())];
        for namespace in &self.injected_namespaces {
            self.installer.ensure_namespace(namespace, &labels).await?;
        }
        info!(
            namespaces = self.injected_namespaces.len(),
            "Labelled system namespaces for sidecar injection"
        );
        Ok(())
    }
}

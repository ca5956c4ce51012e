//! Test fakes for components and the cluster
//!
//! Enabled with the `test-utils` feature so dependent crates can share them
//! from their `[dev-dependencies]`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use crate::capability::{Capabilities, Capability};
use crate::cluster::{
    ClusterStateReader, PackageInstaller, PackageRelease, ReleaseStatus, WorkloadRef,
};
use crate::component::{Component, SharedComponent, ValueOverride};
use crate::context::ComponentContext;
use crate::error::{ComponentError, Result};

/// Component with scripted readiness and hook outcomes
pub struct StubComponent {
    name: String,
    dependencies: Vec<String>,
    capabilities: Capabilities,
    ready: AtomicBool,
    ready_after_install: AtomicBool,
    fail_install: AtomicBool,
    fail_upgrade: AtomicBool,
    ready_probes: AtomicU32,
    install_calls: AtomicU32,
    upgrade_calls: AtomicU32,
    hook_log: Mutex<Vec<String>>,
}

impl StubComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            capabilities: Capabilities::none(),
            ready: AtomicBool::new(false),
            ready_after_install: AtomicBool::new(false),
            fail_install: AtomicBool::new(false),
            fail_upgrade: AtomicBool::new(false),
            ready_probes: AtomicU32::new(0),
            install_calls: AtomicU32::new(0),
            upgrade_calls: AtomicU32::new(0),
            hook_log: Mutex::new(Vec::new()),
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn ready(self, ready: bool) -> Self {
        self.ready.store(ready, Ordering::SeqCst);
        self
    }

    /// Report ready as soon as install or upgrade has run once
    pub fn ready_after_install(self) -> Self {
        self.ready_after_install.store(true, Ordering::SeqCst);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_fail_install(&self, fail: bool) {
        self.fail_install.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_upgrade(&self, fail: bool) {
        self.fail_upgrade.store(fail, Ordering::SeqCst);
    }

    pub fn ready_probes(&self) -> u32 {
        self.ready_probes.load(Ordering::SeqCst)
    }

    pub fn install_calls(&self) -> u32 {
        self.install_calls.load(Ordering::SeqCst)
    }

    pub fn upgrade_calls(&self) -> u32 {
        self.upgrade_calls.load(Ordering::SeqCst)
    }

    /// Names of the hooks invoked so far, in call order
    pub fn hook_log(&self) -> Vec<String> {
        self.hook_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn record(&self, hook: &str) {
        if let Ok(mut log) = self.hook_log.lock() {
            log.push(hook.to_string());
        }
    }
}

#[async_trait]
impl Component for StubComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    async fn is_ready(&self, _ctx: &ComponentContext) -> bool {
        self.ready_probes.fetch_add(1, Ordering::SeqCst);
        self.ready.load(Ordering::SeqCst)
    }

    async fn install(&self, _ctx: &ComponentContext) -> Result<()> {
        self.install_calls.fetch_add(1, Ordering::SeqCst);
        self.record("install");
        if self.fail_install.load(Ordering::SeqCst) {
            return Err(ComponentError::hook_failed(&self.name, "install", "scripted failure"));
        }
        if self.ready_after_install.load(Ordering::SeqCst) {
            self.set_ready(true);
        }
        Ok(())
    }

    async fn upgrade(&self, _ctx: &ComponentContext) -> Result<()> {
        self.upgrade_calls.fetch_add(1, Ordering::SeqCst);
        self.record("upgrade");
        if self.fail_upgrade.load(Ordering::SeqCst) {
            return Err(ComponentError::hook_failed(&self.name, "upgrade", "scripted failure"));
        }
        if self.ready_after_install.load(Ordering::SeqCst) {
            self.set_ready(true);
        }
        Ok(())
    }

    async fn pre_install(&self, _ctx: &ComponentContext) -> Result<()> {
        self.record("pre_install");
        Ok(())
    }

    async fn post_install(&self, _ctx: &ComponentContext) -> Result<()> {
        self.record("post_install");
        Ok(())
    }

    async fn pre_upgrade(&self, _ctx: &ComponentContext) -> Result<()> {
        self.record("pre_upgrade");
        Ok(())
    }
}

/// Erase a stub into a catalog entry while keeping the typed handle
pub fn share(stub: &Arc<StubComponent>) -> SharedComponent {
    stub.clone()
}

/// In-memory cluster implementing both collaborator traits
#[derive(Default)]
pub struct InMemoryCluster {
    workloads: DashMap<(String, String), bool>,
    namespaces: DashMap<String, Vec<(String, String)>>,
    releases: DashMap<(String, String), ReleaseStatus>,
    failing_releases: DashSet<String>,
    applied: Mutex<Vec<PackageRelease>>,
    manifests: Mutex<Vec<(PathBuf, Vec<ValueOverride>)>>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_workload_ready(&self, namespace: &str, name: &str, ready: bool) {
        self.workloads
            .insert((namespace.to_string(), name.to_string()), ready);
    }

    pub fn set_release_status(&self, release: &str, namespace: &str, status: ReleaseStatus) {
        self.releases
            .insert((release.to_string(), namespace.to_string()), status);
    }

    /// Make every upgrade_install of this release fail
    pub fn fail_release(&self, release: &str) {
        self.failing_releases.insert(release.to_string());
    }

    pub fn applied_releases(&self) -> Vec<PackageRelease> {
        self.applied
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }

    pub fn applied_manifests(&self) -> Vec<(PathBuf, Vec<ValueOverride>)> {
        self.manifests
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn namespace_labels(&self, name: &str) -> Option<Vec<(String, String)>> {
        self.namespaces.get(name).map(|l| l.clone())
    }
}

#[async_trait]
impl ClusterStateReader for InMemoryCluster {
    async fn workload_ready(&self, namespace: &str, workload: &WorkloadRef) -> Result<bool> {
        Ok(self
            .workloads
            .get(&(namespace.to_string(), workload.name.clone()))
            .map(|r| *r)
            .unwrap_or(false))
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool> {
        Ok(self.namespaces.contains_key(name))
    }
}

#[async_trait]
impl PackageInstaller for InMemoryCluster {
    async fn upgrade_install(&self, release: &PackageRelease) -> Result<()> {
        if self.failing_releases.contains(&release.release_name) {
            self.set_release_status(
                &release.release_name,
                &release.namespace,
                ReleaseStatus::Failed,
            );
            return Err(ComponentError::Installer(format!(
                "release {} failed",
                release.release_name
            )));
        }
        if let Ok(mut applied) = self.applied.lock() {
            applied.push(release.clone());
        }
        if !release.dry_run {
            self.set_release_status(
                &release.release_name,
                &release.namespace,
                ReleaseStatus::Deployed,
            );
        }
        Ok(())
    }

    async fn release_status(&self, release_name: &str, namespace: &str) -> Result<ReleaseStatus> {
        Ok(self
            .releases
            .get(&(release_name.to_string(), namespace.to_string()))
            .map(|s| *s)
            .unwrap_or(ReleaseStatus::NotFound))
    }

    async fn apply_manifest(&self, path: &Path, overrides: &[ValueOverride]) -> Result<()> {
        if let Ok(mut manifests) = self.manifests.lock() {
            manifests.push((path.to_path_buf(), overrides.to_vec()));
        }
        Ok(())
    }

    async fn ensure_namespace(&self, name: &str, labels: &[(String, String)]) -> Result<()> {
        let mut entry = self.namespaces.entry(name.to_string()).or_default();
        for (key, value) in labels {
            match entry.iter().position(|(k, _)| k == key) {
                Some(pos) => entry[pos].1 = value.clone(),
                None => entry.push((key.clone(), value.clone())),
            }
        }
        Ok(())
    }
}

//! Narrow interfaces to the cluster
//!
//! The core never reads or writes cluster objects itself. Component adapters
//! reach the cluster only through these two traits, so tests can substitute
//! an in-memory cluster and production can plug in a real client.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::component::ValueOverride;
use crate::error::Result;

/// Kind of workload whose readiness is probed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
}

/// Reference to a workload in some namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub kind: WorkloadKind,
    pub name: String,
}

impl WorkloadRef {
    pub fn deployment(name: impl Into<String>) -> Self {
        Self {
            kind: WorkloadKind::Deployment,
            name: name.into(),
        }
    }

    pub fn stateful_set(name: impl Into<String>) -> Self {
        Self {
            kind: WorkloadKind::StatefulSet,
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            WorkloadKind::Deployment => "deployment",
            WorkloadKind::StatefulSet => "statefulset",
        };
        write!(f, "{}/{}", kind, self.name)
    }
}

/// Status of a package release as reported by the installer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseStatus {
    /// No release with this name exists
    NotFound,
    /// An install or upgrade is in progress
    Pending,
    /// The release is deployed
    Deployed,
    /// The last operation on the release failed
    Failed,
}

impl ReleaseStatus {
    pub fn is_deployed(&self) -> bool {
        matches!(self, ReleaseStatus::Deployed)
    }
}

/// A package release to apply with upgrade-or-install semantics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRelease {
    /// Release name
    pub release_name: String,
    /// Namespace the release is installed into
    pub namespace: String,
    /// Directory holding the package sources
    pub chart_dir: PathBuf,
    /// Value files, applied in order
    pub values_files: Vec<PathBuf>,
    /// Individual overrides, applied after the value files
    pub overrides: Vec<ValueOverride>,
    /// Render only, do not apply
    pub dry_run: bool,
}

/// Read-only view of cluster state used by readiness probes
#[async_trait]
pub trait ClusterStateReader: Send + Sync {
    /// Whether the workload exists and reports all replicas ready
    async fn workload_ready(&self, namespace: &str, workload: &WorkloadRef) -> Result<bool>;

    /// Whether a namespace exists
    async fn namespace_exists(&self, name: &str) -> Result<bool>;
}

/// Applies packages and manifests to the cluster
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Install the release, or upgrade it in place if it already exists
    async fn upgrade_install(&self, release: &PackageRelease) -> Result<()>;

    /// Current status of a release
    async fn release_status(&self, release_name: &str, namespace: &str) -> Result<ReleaseStatus>;

    /// Apply a manifest file with the given overrides
    async fn apply_manifest(&self, path: &std::path::Path, overrides: &[ValueOverride])
        -> Result<()>;

    /// Create the namespace if missing and merge the given labels into it
    async fn ensure_namespace(&self, name: &str, labels: &[(String, String)]) -> Result<()>;
}

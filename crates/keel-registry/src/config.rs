//! Catalog configuration.
//!
//! Locations of package sources and value-override files, plus the
//! namespaces the mesh injects sidecars into.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration consumed by the platform catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Packages maintained with the platform.
    #[serde(default = "default_charts_dir")]
    pub charts_dir: PathBuf,

    /// Third-party packages vendored into the platform.
    #[serde(default = "default_third_party_dir")]
    pub third_party_dir: PathBuf,

    /// Value-override files, one or more per component.
    #[serde(default = "default_overrides_dir")]
    pub overrides_dir: PathBuf,

    /// Namespaces labelled for sidecar injection when the mesh installs.
    #[serde(default = "default_injected_namespaces")]
    pub injected_system_namespaces: Vec<String>,

    /// Image pull secret passed to operator-installed packages.
    #[serde(default)]
    pub image_pull_secret: Option<String>,

    /// Namespace the platform core installs into.
    #[serde(default = "default_platform_namespace")]
    pub platform_namespace: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            charts_dir: default_charts_dir(),
            third_party_dir: default_third_party_dir(),
            overrides_dir: default_overrides_dir(),
            injected_system_namespaces: default_injected_namespaces(),
            image_pull_secret: None,
            platform_namespace: default_platform_namespace(),
        }
    }
}

impl CatalogConfig {
    /// Configuration rooted at a single install directory.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            charts_dir: root.join("charts"),
            third_party_dir: root.join("thirdparty/charts"),
            overrides_dir: root.join("overrides"),
            ..Self::default()
        }
    }

    pub fn chart(&self, name: &str) -> PathBuf {
        self.charts_dir.join(name)
    }

    pub fn third_party_chart(&self, name: &str) -> PathBuf {
        self.third_party_dir.join(name)
    }

    pub fn override_file(&self, file: &str) -> PathBuf {
        self.overrides_dir.join(file)
    }
}

fn default_charts_dir() -> PathBuf {
    PathBuf::from("/keel/platform-operator/helm_config/charts")
}

fn default_third_party_dir() -> PathBuf {
    PathBuf::from("/keel/platform-operator/thirdparty/charts")
}

fn default_overrides_dir() -> PathBuf {
    PathBuf::from("/keel/platform-operator/helm_config/overrides")
}

fn default_platform_namespace() -> String {
    "keel-system".to_string()
}

fn default_injected_namespaces() -> Vec<String> {
    vec!["keel-system".to_string(), "ingress-nginx".to_string(), "keycloak".to_string()]
}

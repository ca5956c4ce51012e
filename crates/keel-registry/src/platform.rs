//! Production component catalog

use std::sync::Arc;

use keel_types::{ClusterStateReader, PackageInstaller, SharedComponent, WorkloadRef};

use crate::catalog::CatalogSource;
use crate::config::CatalogConfig;
use crate::mesh::{MeshComponent, INJECTION_LABEL, MESH_COMPONENT_NAME};
use crate::package::{PackageComponent, StandardHooks};

const DEFAULT_PULL_SECRET_KEY: &str = "imagePullSecrets[0].name";
const GLOBAL_PULL_SECRET_KEY: &str = "global.imagePullSecrets[0]";

pub const INGRESS_COMPONENT_NAME: &str = "ingress-controller";
pub const INGRESS_NAMESPACE: &str = "ingress-nginx";
pub const PLATFORM_CORE_NAME: &str = "platform-core";
pub const KEYCLOAK_NAMESPACE: &str = "keycloak";

/// Catalog of every component making up the managed platform
///
/// Entries are listed in processing order. Dependencies are declared by
/// name and do not need to match that order.
pub struct PlatformCatalog {
    config: CatalogConfig,
    cluster: Arc<dyn ClusterStateReader>,
    installer: Arc<dyn PackageInstaller>,
}

impl PlatformCatalog {
    pub fn new(
        config: CatalogConfig,
        cluster: Arc<dyn ClusterStateReader>,
        installer: Arc<dyn PackageInstaller>,
    ) -> Self {
        Self {
            config,
            cluster,
            installer,
        }
    }

    pub fn shared(self) -> Arc<dyn CatalogSource> {
        Arc::new(self)
    }

    fn hooks(&self) -> StandardHooks {
        StandardHooks::new(self.cluster.clone(), self.installer.clone())
    }

    fn package(&self, name: &str, chart_dir: std::path::PathBuf, namespace: &str) -> PackageComponent {
        PackageComponent::new(name, chart_dir, namespace, self.installer.clone())
    }

    fn operator(&self, package: PackageComponent, key: &str) -> PackageComponent {
        package.operator_install(key, self.config.image_pull_secret.clone())
    }

    fn components(&self) -> Vec<SharedComponent> {
        let cfg = &self.config;
        let system_ns = cfg.platform_namespace.as_str();
        let injected = vec![(INJECTION_LABEL.to_string(), "enabled".to_string())];

        let ingress = self
            .operator(
                self.package(
                    INGRESS_COMPONENT_NAME,
                    cfg.third_party_chart("ingress-nginx"),
                    INGRESS_NAMESPACE,
                ),
                DEFAULT_PULL_SECRET_KEY,
            )
            .values_file(cfg.override_file("ingress-nginx-values.yaml"))
            .depends_on([MESH_COMPONENT_NAME])
            .hooks(
                self.hooks()
                    .ensure_namespace(vec![
                        ("keel.io/namespace".to_string(), INGRESS_NAMESPACE.to_string()),
                        (INJECTION_LABEL.to_string(), "enabled".to_string()),
                    ])
                    .with_override("controller.service.type", "LoadBalancer")
                    .verify_release()
                    .ready_when([
                        WorkloadRef::deployment("ingress-controller-ingress-nginx-controller"),
                        WorkloadRef::deployment("ingress-controller-ingress-nginx-defaultbackend"),
                    ])
                    .shared(),
            );

        let cert_manager = self
            .package("cert-manager", cfg.third_party_chart("cert-manager"), "cert-manager")
            .values_file(cfg.override_file("cert-manager-values.yaml"));

        let external_dns = self
            .package("external-dns", cfg.third_party_chart("external-dns"), "cert-manager")
            .values_file(cfg.override_file("external-dns-values.yaml"));

        let rancher = self
            .package("rancher", cfg.third_party_chart("rancher"), "cattle-system")
            .values_file(cfg.override_file("rancher-values.yaml"));

        let platform_core = self
            .package(PLATFORM_CORE_NAME, cfg.chart(PLATFORM_CORE_NAME), "keel-system")
            .hooks(
                self.hooks()
                    .install_into(system_ns)
                    .apply_before_upgrade(cfg.chart(PLATFORM_CORE_NAME).join("crds"))
                    .shared(),
            );

        let coherence = self
            .operator(
                self.package(
                    "coherence-operator",
                    cfg.third_party_chart("coherence-operator"),
                    system_ns,
                ),
                DEFAULT_PULL_SECRET_KEY,
            )
            .values_file(cfg.override_file("coherence-values.yaml"))
            .hooks(
                self.hooks()
                    .ready_when([WorkloadRef::deployment("coherence-operator")])
                    .shared(),
            );

        let weblogic = self
            .operator(
                self.package(
                    "weblogic-operator",
                    cfg.third_party_chart("weblogic-operator"),
                    system_ns,
                ),
                DEFAULT_PULL_SECRET_KEY,
            )
            .values_file(cfg.override_file("weblogic-values.yaml"))
            .depends_on([MESH_COMPONENT_NAME])
            .hooks(
                self.hooks()
                    .ensure_namespace(injected.clone())
                    .with_override("domainNamespaceSelectionStrategy", "LabelSelector")
                    .with_override("domainNamespaceLabelSelector", "keel-managed")
                    .ready_when([WorkloadRef::deployment("weblogic-operator")])
                    .shared(),
            );

        let oam = self
            .operator(
                self.package(
                    "oam-kubernetes-runtime",
                    cfg.third_party_chart("oam-kubernetes-runtime"),
                    system_ns,
                ),
                DEFAULT_PULL_SECRET_KEY,
            )
            .values_file(cfg.override_file("oam-kubernetes-runtime-values.yaml"))
            .hooks(
                self.hooks()
                    .ready_when([WorkloadRef::deployment("oam-kubernetes-runtime")])
                    .shared(),
            );

        let application_operator = self
            .operator(
                self.package(
                    "application-operator",
                    cfg.chart("application-operator"),
                    system_ns,
                ),
                GLOBAL_PULL_SECRET_KEY,
            )
            .values_file(cfg.override_file("application-operator-values.yaml"))
            .depends_on(["oam-kubernetes-runtime"])
            .hooks(
                self.hooks()
                    .with_override(
                        "global.injectedNamespaces",
                        cfg.injected_system_namespaces.join(","),
                    )
                    .apply_before_upgrade(cfg.chart("application-operator").join("crds"))
                    .ready_when([WorkloadRef::deployment("application-operator")])
                    .shared(),
            );

        let mysql = self
            .package("mysql", cfg.third_party_chart("mysql"), KEYCLOAK_NAMESPACE)
            .values_file(cfg.override_file("mysql-values.yaml"))
            .hooks(
                self.hooks()
                    .ensure_namespace(injected.clone())
                    .ready_when([WorkloadRef::deployment("mysql")])
                    .shared(),
            );

        let keycloak = self
            .package("keycloak", cfg.third_party_chart("keycloak"), KEYCLOAK_NAMESPACE)
            .values_file(cfg.override_file("keycloak-values.yaml"))
            .depends_on(["mysql"])
            .hooks(
                self.hooks()
                    .ensure_namespace(injected)
                    .ready_when([WorkloadRef::stateful_set("keycloak")])
                    .shared(),
            );

        let mesh = MeshComponent::new(
            cfg.override_file("istio-cr.yaml"),
            cfg.injected_system_namespaces.clone(),
            self.cluster.clone(),
            self.installer.clone(),
        )
        .image_pull_secret(cfg.image_pull_secret.clone());

        vec![
            Arc::new(ingress) as SharedComponent,
            Arc::new(cert_manager),
            Arc::new(external_dns),
            Arc::new(rancher),
            Arc::new(platform_core),
            Arc::new(coherence),
            Arc::new(weblogic),
            Arc::new(oam),
            Arc::new(application_operator),
            Arc::new(mysql),
            Arc::new(keycloak),
            Arc::new(mesh),
        ]
    }
}

impl CatalogSource for PlatformCatalog {
    fn name(&self) -> &str {
        "platform"
    }

    fn build(&self) -> Vec<SharedComponent> {
        self.components()
    }
}

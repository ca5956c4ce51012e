//! Dependency resolution
//!
//! A depth-first walk over a component's declared dependencies. Each
//! dependency's own dependencies are resolved before its readiness is probed
//! and recorded, so a parent's decision always rests on a fully evaluated
//! subtree. Every visited name carries an explicit state for the duration of
//! one walk:
//!
//! - `InProgress`: on the current path; revisiting it is a back-edge
//! - `Done`: fully resolved earlier in this walk
//!
//! A back-edge is always a cycle. Revisiting a `Done` node is governed by
//! [`RevisitPolicy`].

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use keel_registry::{Catalog, ComponentRegistry};
use keel_types::{ComponentContext, SharedComponent};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ResolveError;
use crate::trace::DependencyTrace;

/// How a walk treats a dependency that was already fully resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevisitPolicy {
    /// Any repeat visit is reported as a cycle, including diamond shapes
    #[default]
    Strict,
    /// A resolved dependency is reused; only back-edges are cycles
    AllowResolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}

#[derive(Default)]
struct WalkState {
    visits: HashMap<String, VisitState>,
    trace: DependencyTrace,
}

/// Resolves the transitive dependencies of a component
pub struct DependencyResolver {
    registry: Arc<ComponentRegistry>,
    policy: RevisitPolicy,
}

impl DependencyResolver {
    pub fn new(registry: Arc<ComponentRegistry>, policy: RevisitPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> RevisitPolicy {
        self.policy
    }

    /// Walk every transitive dependency of `component` and record its readiness
    ///
    /// The walk reads one catalog snapshot from start to finish. A dependency
    /// that is not ready is recorded as `false` and its siblings are still
    /// evaluated; only structural errors abort the walk.
    #[instrument(skip(self, component, ctx), fields(component = %component.name()))]
    pub async fn check_dependencies(
        &self,
        component: &SharedComponent,
        ctx: &ComponentContext,
    ) -> Result<DependencyTrace, ResolveError> {
        let catalog = self.registry.catalog()?;
        let mut state = WalkState::default();
        state
            .visits
            .insert(component.name().to_string(), VisitState::InProgress);

        self.walk(&catalog, component.clone(), ctx, &mut state).await?;
        Ok(state.trace)
    }

    fn walk<'a>(
        &'a self,
        catalog: &'a Catalog,
        component: SharedComponent,
        ctx: &'a ComponentContext,
        state: &'a mut WalkState,
    ) -> BoxFuture<'a, Result<(), ResolveError>> {
        async move {
            for dependency in component.dependencies() {
                match state.visits.get(dependency.as_str()) {
                    Some(VisitState::InProgress) => {
                        return Err(cycle(component.name(), dependency));
                    }
                    Some(VisitState::Done) => match self.policy {
                        RevisitPolicy::Strict => return Err(cycle(component.name(), dependency)),
                        RevisitPolicy::AllowResolved => continue,
                    },
                    None => {}
                }

                let Some(resolved) = catalog.get(dependency).cloned() else {
                    return Err(ResolveError::MissingDependency {
                        component: component.name().to_string(),
                        dependency: dependency.clone(),
                    });
                };

                state
                    .visits
                    .insert(dependency.clone(), VisitState::InProgress);
                self.walk(catalog, resolved.clone(), ctx, &mut *state)
                    .await?;

                let ready = resolved.is_ready(ctx).await;
                debug!(component = %component.name(), dependency = %dependency, ready, "Probed dependency");
                state.trace.record(dependency, ready);
                state.visits.insert(dependency.clone(), VisitState::Done);
            }
            Ok(())
        }
        .boxed()
    }
}

fn cycle(component: &str, dependency: &str) -> ResolveError {
    ResolveError::Cycle {
        component: component.to_string(),
        dependency: dependency.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_registry::FnCatalogSource;
    use keel_types::testing::{share, StubComponent};

    fn registry(build: impl Fn() -> Vec<SharedComponent> + Send + Sync + 'static) -> Arc<ComponentRegistry> {
        Arc::new(ComponentRegistry::new(FnCatalogSource::shared("test", build)))
    }

    fn stub(name: &str, deps: &[&str], ready: bool) -> SharedComponent {
        Arc::new(StubComponent::new(name).depends_on(deps.iter().copied()).ready(ready))
    }

    async fn check(
        registry: &Arc<ComponentRegistry>,
        policy: RevisitPolicy,
        name: &str,
    ) -> Result<DependencyTrace, ResolveError> {
        let resolver = DependencyResolver::new(registry.clone(), policy);
        let component = registry.find_component(name).unwrap().unwrap();
        resolver
            .check_dependencies(&component, &ComponentContext::new("test"))
            .await
    }

    #[tokio::test]
    async fn test_trace_records_every_dependency() {
        let registry = registry(|| {
            vec![
                stub("ingress", &[], true),
                stub("mesh", &[], false),
                stub("app", &["ingress", "mesh"], false),
            ]
        });

        let trace = check(&registry, RevisitPolicy::Strict, "app").await.unwrap();
        assert_eq!(trace.to_string(), "{ingress: true, mesh: false}");
    }

    #[tokio::test]
    async fn test_dependencies_of_dependencies_come_first() {
        let registry = registry(|| {
            vec![
                stub("keycloak", &["mysql"], true),
                stub("mysql", &["istio"], true),
                stub("istio", &[], true),
                stub("app", &["keycloak"], false),
            ]
        });

        let trace = check(&registry, RevisitPolicy::Strict, "app").await.unwrap();
        let names: Vec<&str> = trace.names().collect();
        assert_eq!(names, vec!["istio", "mysql", "keycloak"]);
        assert!(!trace.contains("app"));
    }

    #[tokio::test]
    async fn test_self_dependency_is_a_cycle() {
        let registry = registry(|| vec![stub("x", &["x"], true)]);
        let err = check(&registry, RevisitPolicy::AllowResolved, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Cycle { component, dependency } if component == "x" && dependency == "x"));
    }

    #[tokio::test]
    async fn test_missing_dependency() {
        let registry = registry(|| vec![stub("app", &["ingress", "ghost"], true), stub("ingress", &[], true)]);
        let err = check(&registry, RevisitPolicy::Strict, "app").await.unwrap_err();
        assert_eq!(err.to_string(), "declared dependency not found for app: ghost");
    }

    #[tokio::test]
    async fn test_diamond_depends_on_policy() {
        let registry = registry(|| {
            vec![
                stub("top", &["left", "right"], false),
                stub("left", &["base"], true),
                stub("right", &["base"], true),
                stub("base", &[], true),
            ]
        });

        let err = check(&registry, RevisitPolicy::Strict, "top").await.unwrap_err();
        assert!(matches!(err, ResolveError::Cycle { component, dependency } if component == "right" && dependency == "base"));

        let trace = check(&registry, RevisitPolicy::AllowResolved, "top").await.unwrap();
        let names: Vec<&str> = trace.names().collect();
        assert_eq!(names, vec!["base", "left", "right"]);
        assert!(trace.all_ready());
    }

    #[tokio::test]
    async fn test_probes_each_dependency_once() {
        let base = StubComponent::new("base").ready(true).shared();
        let probe = base.clone();
        let registry = registry(move || {
            vec![
                stub("top", &["left", "right"], false),
                stub("left", &["base"], true),
                stub("right", &["base"], true),
                share(&probe),
            ]
        });

        check(&registry, RevisitPolicy::AllowResolved, "top").await.unwrap();
        assert_eq!(base.ready_probes(), 1);
    }
}

//! Readiness gate
//!
//! The admission check consulted before a component may enter `Installing`
//! or `Upgrading`. It fails closed: a structural problem in the dependency
//! graph blocks progress exactly like an unready dependency, and is logged
//! so the defect stays visible without taking down unrelated components.

use std::sync::Arc;

use keel_registry::ComponentRegistry;
use keel_types::{ComponentContext, SharedComponent};
use tracing::{error, info};

use crate::error::ResolveError;
use crate::resolver::{DependencyResolver, RevisitPolicy};
use crate::trace::DependencyTrace;

/// Outcome of one gate evaluation
#[derive(Debug)]
pub enum GateDecision {
    /// The component declares no dependencies
    NoDependencies,
    /// Every transitive dependency is ready
    Satisfied(DependencyTrace),
    /// At least one transitive dependency is not ready
    Blocked { trace: DependencyTrace },
    /// The dependency graph could not be resolved
    Failed(ResolveError),
}

impl GateDecision {
    pub fn is_open(&self) -> bool {
        matches!(self, GateDecision::NoDependencies | GateDecision::Satisfied(_))
    }

    /// Dependencies holding the gate closed, in walk order
    pub fn blocked_on(&self) -> Vec<&str> {
        match self {
            GateDecision::Blocked { trace } => trace.not_ready(),
            _ => Vec::new(),
        }
    }

    pub fn trace(&self) -> Option<&DependencyTrace> {
        match self {
            GateDecision::Satisfied(trace) | GateDecision::Blocked { trace } => Some(trace),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ResolveError> {
        match self {
            GateDecision::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Admission check over a component's dependency graph
pub struct ReadinessGate {
    resolver: DependencyResolver,
}

impl ReadinessGate {
    pub fn new(resolver: DependencyResolver) -> Self {
        Self { resolver }
    }

    pub fn for_registry(registry: Arc<ComponentRegistry>, policy: RevisitPolicy) -> Self {
        Self::new(DependencyResolver::new(registry, policy))
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    /// Evaluate the gate, keeping the trace or error for diagnostics
    ///
    /// Read-only with respect to lifecycle state; the only side effects are
    /// the dependencies' readiness probes.
    pub async fn evaluate(&self, component: &SharedComponent, ctx: &ComponentContext) -> GateDecision {
        let trace = match self.resolver.check_dependencies(component, ctx).await {
            Ok(trace) => trace,
            Err(e) => {
                error!(component = %component.name(), error = %e, "Dependency resolution failed");
                return GateDecision::Failed(e);
            }
        };

        if trace.is_empty() {
            info!(component = %component.name(), "No dependencies declared");
            return GateDecision::NoDependencies;
        }

        info!(component = %component.name(), trace = %trace, "Dependency trace results");
        if trace.all_ready() {
            GateDecision::Satisfied(trace)
        } else {
            GateDecision::Blocked { trace }
        }
    }

    /// Whether every transitive dependency of `component` is ready right now
    pub async fn are_dependencies_met(&self, component: &SharedComponent, ctx: &ComponentContext) -> bool {
        self.evaluate(component, ctx).await.is_open()
    }
}

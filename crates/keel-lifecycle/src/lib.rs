//! Keel Lifecycle - dependency resolution and lifecycle gating
//!
//! This crate decides when a component may progress. It walks a component's
//! declared dependencies through the registry, combines their readiness into
//! a single admission decision, and sequences each component through
//! `NotInstalled -> Installing -> Ready -> Upgrading -> Ready`.
//!
//! ## Pieces
//!
//! - [`DependencyResolver`]: depth-first walk producing a [`DependencyTrace`],
//!   rejecting cycles and unresolved names
//! - [`ReadinessGate`]: fail-closed go/no-go decision over a trace
//! - [`ComponentLifecycle`]: one component's state machine, gated on every
//!   admission
//! - [`Reconciler`]: reference driver stepping the whole catalog on an interval
//!
//! ## Example
//!
//! ```ignore
//! let registry = Arc::new(ComponentRegistry::new(catalog));
//! let gate = ReadinessGate::for_registry(registry.clone(), RevisitPolicy::Strict);
//! if gate.are_dependencies_met(&component, &ctx).await {
//!     component.install(&ctx).await?;
//! }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod error;
pub mod gate;
pub mod machine;
pub mod reconciler;
pub mod resolver;
pub mod status;
pub mod telemetry;
pub mod trace;

pub use config::{KeelConfig, LifecycleConfig, LoggingConfig};
pub use error::{LifecycleError, ResolveError, Result};
pub use gate::{GateDecision, ReadinessGate};
pub use machine::{ComponentLifecycle, Transition};
pub use reconciler::{ComponentOutcome, LifecycleEvent, ReconcileSummary, Reconciler};
pub use resolver::{DependencyResolver, RevisitPolicy};
pub use status::{namespaces_for_not_ready, not_ready_components};
pub use telemetry::init_tracing;
pub use trace::{DependencyTrace, TraceEntry};

//! Keel Types - Core types for platform lifecycle management
//!
//! Keel installs, upgrades and tracks readiness for a fixed set of
//! interdependent platform components (ingress, certificates, DNS, identity,
//! data stores, application runtimes, service mesh) running on a
//! container-orchestration cluster.
//!
//! ## Architectural Boundaries
//!
//! - **keel-types** owns: the component capability contract, lifecycle states,
//!   and the narrow traits through which the cluster is reached
//! - **keel-registry** owns: the ordered component catalog and its construction
//! - **keel-lifecycle** owns: dependency resolution, readiness gating and the
//!   per-component state machine
//!
//! ## Key Concepts
//!
//! - **Component**: one independently installable subsystem, shared as
//!   [`SharedComponent`]
//! - **Capabilities**: which optional lifecycle hooks a component provides
//! - **ComponentContext**: identity, logging and cancellation carried through
//!   every hook call
//! - **LifecycleState**: NotInstalled -> Installing -> Ready -> Upgrading -> Ready

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod capability;
pub mod cluster;
pub mod component;
pub mod context;
pub mod error;
pub mod lifecycle;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export main types
pub use capability::{Capabilities, Capability};
pub use cluster::{
    ClusterStateReader, PackageInstaller, PackageRelease, ReleaseStatus, WorkloadKind,
    WorkloadRef,
};
pub use component::{Component, SharedComponent, ValueOverride};
pub use context::{CancellationFlag, ComponentContext};
pub use error::{ComponentError, Result};
pub use lifecycle::{ComponentStatus, LifecycleState};

//! Keel Registry - the ordered component catalog
//!
//! The registry answers two questions for the rest of the system: which
//! components exist, in which default processing order, and which component
//! a dependency name refers to. It never touches the cluster itself.
//!
//! ## Catalog construction
//!
//! A [`ComponentRegistry`] is built from a [`CatalogSource`]. Production uses
//! [`PlatformCatalog`]; tests swap in small stub catalogs with
//! [`ComponentRegistry::override_catalog_source`] and restore production with
//! [`ComponentRegistry::reset_catalog_source`].
//!
//! ## Adapters
//!
//! - [`PackageComponent`]: generic packaged-application installer with
//!   optional [`PackageHooks`]
//! - [`MeshComponent`]: service mesh installed from an operator manifest

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod catalog;
pub mod config;
pub mod error;
pub mod mesh;
pub mod package;
pub mod platform;
pub mod registry;

pub use catalog::{Catalog, CatalogSource, FnCatalogSource};
pub use config::CatalogConfig;
pub use error::{RegistryError, Result};
pub use mesh::MeshComponent;
pub use package::{NoHooks, PackageComponent, PackageHooks, PackageInfo, StandardHooks};
pub use platform::PlatformCatalog;
pub use registry::ComponentRegistry;

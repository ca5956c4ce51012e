//! Component registry
//!
//! The registry is the authoritative, ordered catalog for the running
//! process. The catalog is built lazily from the active [`CatalogSource`]
//! and then cached; it is never edited in place. The only writer is the
//! override/reset pair, which swaps the whole construction function and drops
//! the cached snapshot, so readers observe either the old catalog or the new
//! one and never a mix.

use std::sync::Arc;

use keel_types::SharedComponent;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogSource};
use crate::error::Result;

struct ActiveSource {
    source: Arc<dyn CatalogSource>,
    overridden: bool,
    catalog: Option<Arc<Catalog>>,
}

/// Registry of platform components
pub struct ComponentRegistry {
    /// Source restored by `reset_catalog_source`
    production: Arc<dyn CatalogSource>,
    /// Source in use plus its cached snapshot
    active: RwLock<ActiveSource>,
}

impl ComponentRegistry {
    /// Create a registry backed by a production catalog source
    pub fn new(production: Arc<dyn CatalogSource>) -> Self {
        Self {
            active: RwLock::new(ActiveSource {
                source: production.clone(),
                overridden: false,
                catalog: None,
            }),
            production,
        }
    }

    /// Current catalog snapshot, building it on first use
    pub fn catalog(&self) -> Result<Arc<Catalog>> {
        if let Some(catalog) = self.active.read().catalog.clone() {
            return Ok(catalog);
        }

        let mut active = self.active.write();
        if let Some(catalog) = active.catalog.clone() {
            return Ok(catalog);
        }

        let components = active.source.build();
        let catalog = match Catalog::new(components) {
            Ok(catalog) => Arc::new(catalog),
            Err(e) => {
                warn!(source = active.source.name(), error = %e, "Rejected component catalog");
                return Err(e);
            }
        };

        debug!(
            source = active.source.name(),
            components = catalog.len(),
            "Built component catalog"
        );
        active.catalog = Some(catalog.clone());
        Ok(catalog)
    }

    /// All components, in declared order
    ///
    /// The order is a processing hint only; it does not satisfy dependencies.
    pub fn list_components(&self) -> Result<Vec<SharedComponent>> {
        Ok(self.catalog()?.components().to_vec())
    }

    /// Look up a component by exact name
    ///
    /// `Ok(None)` is the normal "not found" answer; callers use it to tell a
    /// missing component apart from one that exists but is not ready.
    pub fn find_component(&self, name: &str) -> Result<Option<SharedComponent>> {
        Ok(self.catalog()?.get(name).cloned())
    }

    /// Replace the catalog construction function
    ///
    /// Intended for test harnesses only. The cached catalog is dropped and the
    /// next read builds from `source`.
    pub fn override_catalog_source(&self, source: Arc<dyn CatalogSource>) {
        let mut active = self.active.write();
        info!(
            from = active.source.name(),
            to = source.name(),
            "Overriding component catalog source"
        );
        active.source = source;
        active.overridden = true;
        active.catalog = None;
    }

    /// Restore the production construction function
    ///
    /// Safe to call repeatedly.
    pub fn reset_catalog_source(&self) {
        let mut active = self.active.write();
        if active.overridden {
            info!(
                source = self.production.name(),
                "Restoring production component catalog source"
            );
        }
        active.source = self.production.clone();
        active.overridden = false;
        active.catalog = None;
    }

    /// Name of the source currently building the catalog
    pub fn catalog_source_name(&self) -> String {
        self.active.read().source.name().to_string()
    }

    /// Whether a test override is in effect
    pub fn is_overridden(&self) -> bool {
        self.active.read().overridden
    }
}

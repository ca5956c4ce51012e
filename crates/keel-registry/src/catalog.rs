//! Catalog snapshots and the functions that build them
//!
//! A [`Catalog`] is an immutable, validated snapshot: components live in an
//! arena in declared order and are indexed by name. Dependencies stay plain
//! names, resolved through [`Catalog::get`] at query time.

use std::collections::HashMap;
use std::sync::Arc;

use keel_types::SharedComponent;

use crate::error::{RegistryError, Result};

/// Builds the ordered list of components for a registry
///
/// Production uses the platform catalog; tests inject small stub catalogs.
pub trait CatalogSource: Send + Sync {
    /// Source name for diagnostics
    fn name(&self) -> &str;

    /// Build the components in processing order
    fn build(&self) -> Vec<SharedComponent>;
}

/// Catalog source backed by a closure
pub struct FnCatalogSource<F> {
    name: String,
    build: F,
}

impl<F> FnCatalogSource<F>
where
    F: Fn() -> Vec<SharedComponent> + Send + Sync,
{
    pub fn new(name: impl Into<String>, build: F) -> Self {
        Self {
            name: name.into(),
            build,
        }
    }

    pub fn shared(name: impl Into<String>, build: F) -> Arc<dyn CatalogSource>
    where
        F: 'static,
    {
        Arc::new(Self::new(name, build))
    }
}

impl<F> CatalogSource for FnCatalogSource<F>
where
    F: Fn() -> Vec<SharedComponent> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self) -> Vec<SharedComponent> {
        (self.build)()
    }
}

/// Validated, immutable catalog snapshot
pub struct Catalog {
    components: Vec<SharedComponent>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Validate and index a component list
    ///
    /// Names must be non-empty and unique. Dependency references are not
    /// checked here; an unresolvable reference is reported when it is walked.
    pub fn new(components: Vec<SharedComponent>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(components.len());

        for (index, component) in components.iter().enumerate() {
            let name = component.name();
            if name.is_empty() {
                return Err(RegistryError::EmptyName { index });
            }
            if by_name.insert(name.to_string(), index).is_some() {
                return Err(RegistryError::DuplicateName(name.to_string()));
            }
        }

        Ok(Self {
            components,
            by_name,
        })
    }

    /// Exact-name lookup
    pub fn get(&self, name: &str) -> Option<&SharedComponent> {
        self.by_name.get(name).map(|&i| &self.components[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Components in declared order
    pub fn components(&self) -> &[SharedComponent] {
        &self.components
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|c| c.name())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_types::testing::StubComponent;

    fn stub(name: &str) -> SharedComponent {
        Arc::new(StubComponent::new(name))
    }

    #[test]
    fn test_catalog_keeps_declared_order() {
        let catalog = Catalog::new(vec![stub("nginx"), stub("cert-manager"), stub("istio")])
            .unwrap();

        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names, vec!["nginx", "cert-manager", "istio"]);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let result = Catalog::new(vec![stub("istio"), stub("mysql"), stub("istio")]);
        assert!(matches!(result, Err(RegistryError::DuplicateName(name)) if name == "istio"));
    }

    #[test]
    fn test_catalog_rejects_empty_name() {
        let result = Catalog::new(vec![stub("istio"), stub("")]);
        assert!(matches!(result, Err(RegistryError::EmptyName { index: 1 })));
    }

    #[test]
    fn test_lookup_is_exact() {
        let catalog = Catalog::new(vec![stub("cert-manager")]).unwrap();

        assert!(catalog.get("cert-manager").is_some());
        assert!(catalog.get("cert").is_none());
        assert!(catalog.get("cert-manager-extra").is_none());
        assert!(catalog.get("").is_none());
    }

    #[test]
    fn test_fn_source_builds_fresh_lists() {
        let source = FnCatalogSource::new("stub", || vec![stub("a"), stub("b")]);
        assert_eq!(source.name(), "stub");
        assert_eq!(source.build().len(), 2);
        assert_eq!(source.build().len(), 2);
    }
}

//! Dependency traces
//!
//! A trace is the result of one resolution walk: every dependency visited,
//! in the order its readiness was recorded, with the readiness observed at
//! that moment. Traces are rebuilt on every query and never cached.

use std::fmt;

use serde::{Serialize, Serializer};
use serde::ser::SerializeMap;

/// One dependency's observed readiness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub name: String,
    pub ready: bool,
}

/// Ordered map of dependency name to readiness
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyTrace {
    entries: Vec<TraceEntry>,
}

impl DependencyTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, name: &str, ready: bool) {
        self.entries.push(TraceEntry {
            name: name.to_string(),
            ready,
        });
    }

    /// Readiness recorded for `name`
    pub fn get(&self, name: &str) -> Option<bool> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.ready)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter()
    }

    /// Dependency names in walk order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// True when every recorded dependency is ready; vacuously true when empty
    pub fn all_ready(&self) -> bool {
        self.entries.iter().all(|e| e.ready)
    }

    /// Dependencies recorded as not ready, in walk order
    pub fn not_ready(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| !e.ready)
            .map(|e| e.name.as_str())
            .collect()
    }
}

impl fmt::Display for DependencyTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", entry.name, entry.ready)?;
        }
        write!(f, "}}")
    }
}

impl Serialize for DependencyTrace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.name, &entry.ready)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(entries: &[(&str, bool)]) -> DependencyTrace {
        let mut trace = DependencyTrace::new();
        for (name, ready) in entries {
            trace.record(name, *ready);
        }
        trace
    }

    #[test]
    fn test_display_keeps_walk_order() {
        let t = trace(&[("ingress", true), ("mesh", false)]);
        assert_eq!(t.to_string(), "{ingress: true, mesh: false}");
        assert_eq!(trace(&[]).to_string(), "{}");
    }

    #[test]
    fn test_readiness_queries() {
        let t = trace(&[("mysql", true), ("istio", false), ("oam", false)]);
        assert_eq!(t.get("mysql"), Some(true));
        assert_eq!(t.get("istio"), Some(false));
        assert_eq!(t.get("keycloak"), None);
        assert!(!t.all_ready());
        assert_eq!(t.not_ready(), vec!["istio", "oam"]);
        assert!(trace(&[]).all_ready());
    }

    #[test]
    fn test_serializes_as_ordered_map() {
        let t = trace(&[("b", true), ("a", false)]);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#"{"b":true,"a":false}"#);
    }
}

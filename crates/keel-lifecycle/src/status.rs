//! Not-ready summaries for operator diagnostics

use std::collections::{HashMap, HashSet};

use keel_types::ComponentStatus;

/// Names of enabled components that are not `Ready`, in the given order
pub fn not_ready_components(statuses: &[ComponentStatus]) -> Vec<String> {
    statuses
        .iter()
        .filter(|s| !s.is_ready() && !s.is_disabled())
        .map(|s| s.name.clone())
        .collect()
}

/// Namespaces holding not-ready components, de-duplicated in first-seen order
///
/// A component may span several namespaces. Components missing from
/// `namespaces` are left out.
pub fn namespaces_for_not_ready(
    statuses: &[ComponentStatus],
    namespaces: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for name in not_ready_components(statuses) {
        for ns in namespaces.get(&name).into_iter().flatten() {
            if seen.insert(ns.as_str()) {
                result.push(ns.clone());
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_types::LifecycleState;

    fn status(name: &str, state: LifecycleState) -> ComponentStatus {
        let mut status = ComponentStatus::new(name);
        status.state = state;
        status
    }

    fn statuses() -> Vec<ComponentStatus> {
        vec![
            status("ingress-controller", LifecycleState::Ready),
            status("mysql", LifecycleState::Installing),
            status("keycloak", LifecycleState::NotInstalled),
            status("rancher", LifecycleState::Disabled),
            status("weblogic-operator", LifecycleState::Upgrading),
        ]
    }

    #[test]
    fn test_not_ready_skips_disabled() {
        assert_eq!(
            not_ready_components(&statuses()),
            vec!["mysql", "keycloak", "weblogic-operator"]
        );
    }

    #[test]
    fn test_namespaces_are_deduplicated() {
        let namespaces: HashMap<String, Vec<String>> = [
            ("mysql", vec!["keycloak"]),
            ("keycloak", vec!["keycloak"]),
            ("rancher", vec!["cattle-system", "cattle-fleet-system"]),
            ("weblogic-operator", vec!["keel-system", "keycloak"]),
        ]
        .into_iter()
        .map(|(c, ns)| (c.to_string(), ns.into_iter().map(String::from).collect()))
        .collect();

        assert_eq!(
            namespaces_for_not_ready(&statuses(), &namespaces),
            vec!["keycloak", "keel-system"]
        );
    }
}

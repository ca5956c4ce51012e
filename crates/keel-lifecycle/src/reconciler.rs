//! Reconciliation driver
//!
//! Steps every enabled component of the catalog through its lifecycle on a
//! fixed interval. Components are stepped independently and concurrently;
//! ordering between them emerges from repeated gate checks across ticks, not
//! from their position in the catalog.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use keel_registry::ComponentRegistry;
use keel_types::{ComponentContext, ComponentStatus, LifecycleState, SharedComponent};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, Mutex, Semaphore};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, instrument, warn};

use crate::config::LifecycleConfig;
use crate::error::{LifecycleError, Result};
use crate::gate::ReadinessGate;
use crate::machine::{ComponentLifecycle, Transition};

/// Lifecycle events broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    StateChanged {
        component: String,
        from: LifecycleState,
        to: LifecycleState,
    },
    Blocked {
        component: String,
        waiting_on: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    HookFailed {
        component: String,
        error: String,
    },
}

/// Result of stepping one component
#[derive(Debug)]
pub struct ComponentOutcome {
    pub component: String,
    pub result: Result<Transition>,
}

/// Result of one reconciliation pass, in catalog order
#[derive(Debug, Default)]
pub struct ReconcileSummary {
    pub outcomes: Vec<ComponentOutcome>,
}

impl ReconcileSummary {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &LifecycleError)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Err(e) => Some((o.component.as_str(), e)),
            Ok(_) => None,
        })
    }

    pub fn blocked(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, Ok(Transition::Blocked { .. })))
            .map(|o| o.component.as_str())
            .collect()
    }

    pub fn transition(&self, component: &str) -> Option<&Transition> {
        self.outcomes
            .iter()
            .find(|o| o.component == component)
            .and_then(|o| o.result.as_ref().ok())
    }

    /// True when nothing is left to do: no failures and no pending work
    pub fn is_settled(&self) -> bool {
        self.outcomes.iter().all(|o| {
            matches!(
                o.result,
                Ok(Transition::Unchanged) | Ok(Transition::Skipped)
            )
        })
    }
}

/// Drives the component lifecycles of one registry
pub struct Reconciler {
    registry: Arc<ComponentRegistry>,
    gate: ReadinessGate,
    config: LifecycleConfig,
    lifecycles: DashMap<String, Arc<Mutex<ComponentLifecycle>>>,
    event_tx: broadcast::Sender<LifecycleEvent>,
    limiter: Semaphore,
}

impl Reconciler {
    pub fn new(registry: Arc<ComponentRegistry>, config: LifecycleConfig) -> Self {
        let gate = ReadinessGate::for_registry(registry.clone(), config.revisit_policy);
        let (event_tx, _) = broadcast::channel(256);
        Self {
            registry,
            gate,
            limiter: Semaphore::new(config.max_concurrent_reconciles.max(1)),
            config,
            lifecycles: DashMap::new(),
            event_tx,
        }
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.event_tx.subscribe()
    }

    fn lifecycle(&self, name: &str) -> Arc<Mutex<ComponentLifecycle>> {
        self.lifecycles
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ComponentLifecycle::new(name))))
            .clone()
    }

    fn known(&self, name: &str) -> Result<()> {
        match self.registry.find_component(name)? {
            Some(_) => Ok(()),
            None => Err(LifecycleError::UnknownComponent(name.to_string())),
        }
    }

    /// Reconcile `name` towards `version` on subsequent ticks
    pub async fn set_desired_version(&self, name: &str, version: &str) -> Result<()> {
        self.known(name)?;
        self.lifecycle(name).lock().await.request_upgrade(version);
        info!(component = %name, version = %version, "Desired version set");
        Ok(())
    }

    /// Reconcile every component towards `version`
    pub async fn set_platform_version(&self, version: &str) -> Result<()> {
        for component in self.registry.list_components()? {
            self.lifecycle(component.name())
                .lock()
                .await
                .request_upgrade(version);
        }
        info!(version = %version, "Platform version set");
        Ok(())
    }

    pub async fn disable(&self, name: &str) -> Result<()> {
        self.known(name)?;
        self.lifecycle(name).lock().await.disable();
        Ok(())
    }

    pub async fn enable(&self, name: &str) -> Result<()> {
        self.known(name)?;
        self.lifecycle(name).lock().await.enable();
        Ok(())
    }

    /// Current status of a catalog component
    pub async fn status(&self, name: &str) -> Result<ComponentStatus> {
        self.known(name)?;
        Ok(self.lifecycle(name).lock().await.status().clone())
    }

    /// Status of every catalog component, in catalog order
    pub async fn statuses(&self) -> Result<Vec<ComponentStatus>> {
        let mut statuses = Vec::new();
        for component in self.registry.list_components()? {
            statuses.push(self.lifecycle(component.name()).lock().await.status().clone());
        }
        Ok(statuses)
    }

    /// Step every component once
    ///
    /// A failing component never stops the others; its error is reported in
    /// the summary and retried on the next pass.
    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn reconcile_once(&self, ctx: &ComponentContext) -> Result<ReconcileSummary> {
        let components = self.registry.list_components()?;
        self.prune(&components);
        let outcomes = join_all(
            components
                .into_iter()
                .map(|component| self.reconcile_component(component, ctx)),
        )
        .await;

        Ok(ReconcileSummary { outcomes })
    }

    /// Forget lifecycles of components that left the catalog
    fn prune(&self, components: &[SharedComponent]) {
        let current: HashSet<&str> = components.iter().map(|c| c.name()).collect();
        self.lifecycles.retain(|name, _| {
            let keep = current.contains(name.as_str());
            if !keep {
                debug!(component = %name, "Dropping lifecycle of removed component");
            }
            keep
        });
    }

    async fn reconcile_component(
        &self,
        component: SharedComponent,
        ctx: &ComponentContext,
    ) -> ComponentOutcome {
        let name = component.name().to_string();
        let Ok(_permit) = self.limiter.acquire().await else {
            return ComponentOutcome {
                component: name,
                result: Ok(Transition::Skipped),
            };
        };

        let lifecycle = self.lifecycle(&name);
        let mut lifecycle = lifecycle.lock().await;
        let from = lifecycle.state();
        let result = lifecycle.step(&component, ctx, &self.gate).await;
        let to = lifecycle.state();
        drop(lifecycle);

        if from != to {
            self.emit(LifecycleEvent::StateChanged {
                component: name.clone(),
                from,
                to,
            });
        }
        match &result {
            Ok(Transition::Blocked { waiting_on, error }) => self.emit(LifecycleEvent::Blocked {
                component: name.clone(),
                waiting_on: waiting_on.clone(),
                error: error.clone(),
            }),
            Err(e) => {
                warn!(component = %name, error = %e, "Component reconciliation failed");
                self.emit(LifecycleEvent::HookFailed {
                    component: name.clone(),
                    error: e.to_string(),
                });
            }
            Ok(_) => {}
        }

        ComponentOutcome {
            component: name,
            result,
        }
    }

    fn emit(&self, event: LifecycleEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Reconcile on every interval tick until `shutdown` flips to true
    pub async fn run(&self, ctx: ComponentContext, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(
            self.config.reconcile_interval_secs.max(1),
        ));
        info!(
            interval_secs = self.config.reconcile_interval_secs,
            "Reconciler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if ctx.is_cancelled() {
                        break;
                    }
                    if let Err(e) = self.reconcile_once(&ctx.child()).await {
                        error!(error = %e, "Reconciliation failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reconciler stopped");
    }
}

//! Allocator — runs the plugin chain over a server snapshot.
//!
//! Each request walks the chain in order, threading the surviving list
//! from one plugin to the next and collecting rejection reasons. The head
//! of the final list is the chosen server. Post hooks then run in reverse
//! chain order so bookkeeping plugins see the outcome.

use std::collections::BTreeMap;
use std::sync::Arc;

use hostalloc_core::{Constraints, EngineConfig, Server, ServerUuid};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capacity::{Capacity, available_capacity};
use crate::error::EngineResult;
use crate::plugin::{Plugin, Reasons, Step};
use crate::registry::Registry;
use crate::state::{StateStore, lock};

/// Survivor count after one plugin ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSummary {
    pub plugin: String,
    pub remaining: usize,
}

/// Outcome of one allocation request.
#[derive(Debug, Clone, Serialize)]
pub struct Allocation {
    /// `None` when no server satisfies the request.
    pub server: Option<Server>,
    /// Why each excluded server was excluded; `None` for capacity-only runs.
    pub reasons: Option<Reasons>,
    pub steps: Vec<StepSummary>,
}

/// A resolved plugin chain plus the state its plugins keep across requests.
///
/// Shareable across threads; concurrent requests serialize per plugin on
/// that plugin's state slot.
pub struct Allocator {
    chain: Vec<Arc<dyn Plugin>>,
    states: StateStore,
}

impl Allocator {
    pub fn new(chain: Vec<Arc<dyn Plugin>>) -> Self {
        Self {
            chain,
            states: StateStore::new(),
        }
    }

    /// Resolve the configured chain against the built-in registry.
    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        let registry = Registry::builtin(&config.tuning);
        Ok(Self::new(registry.resolve(&config.chain())?))
    }

    /// Plugin names in chain order.
    pub fn chain(&self) -> Vec<&'static str> {
        self.chain.iter().map(|p| p.name()).collect()
    }

    /// Pick a server for `constraints.vm` out of `servers`.
    ///
    /// A plugin error aborts the request. An empty result is not an error:
    /// `server` is `None` and `reasons` explains every exclusion. With
    /// `capacity_only` set no reasons are collected and no post hooks run.
    pub fn allocate(&self, servers: Vec<Server>, constraints: &Constraints) -> EngineResult<Allocation> {
        let original = servers.clone();
        let mut current = servers;
        let mut reasons = Reasons::new();
        let mut steps = Vec::with_capacity(self.chain.len());

        for plugin in &self.chain {
            let step = self.run_plugin(plugin.as_ref(), current, constraints)?;
            debug!(
                plugin = plugin.name(),
                remaining = step.servers.len(),
                excluded = step.reasons.len(),
                "plugin step complete"
            );

            if !constraints.capacity_only {
                for (uuid, reason) in step.reasons {
                    reasons.entry(uuid).or_insert(reason);
                }
            }
            steps.push(StepSummary {
                plugin: plugin.name().to_string(),
                remaining: step.servers.len(),
            });
            current = step.servers;
        }

        let chosen = current.into_iter().next();

        // Simulations leave no trace in plugin state.
        let hooks = self.chain.iter().rev().filter(|_| !constraints.capacity_only);
        for plugin in hooks {
            if let Err(e) = self.post_plugin(plugin.as_ref(), &original, chosen.as_ref(), constraints) {
                warn!(plugin = plugin.name(), error = %e, "post-allocation hook failed");
            }
        }

        match &chosen {
            Some(server) => info!(
                vm = %constraints.vm.uuid,
                server = %server.uuid,
                hostname = %server.hostname,
                "server chosen"
            ),
            None => info!(
                vm = %constraints.vm.uuid,
                excluded = reasons.len(),
                "no server satisfies request"
            ),
        }

        Ok(Allocation {
            server: chosen,
            reasons: (!constraints.capacity_only).then_some(reasons),
            steps,
        })
    }

    /// Available capacity of each server once capacity-affecting plugins
    /// (phantom VMs, unusable-server filters) have run.
    ///
    /// No placement happens and no post hooks run.
    pub fn capacity(
        &self,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<BTreeMap<ServerUuid, Capacity>> {
        let mut simulation = constraints.clone();
        simulation.capacity_only = true;

        let mut current = servers;
        for plugin in self.chain.iter().filter(|p| p.affects_capacity()) {
            current = self.run_plugin(plugin.as_ref(), current, &simulation)?.servers;
        }

        Ok(current
            .iter()
            .map(|s| (s.uuid.clone(), available_capacity(s)))
            .collect())
    }

    fn run_plugin(
        &self,
        plugin: &dyn Plugin,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step> {
        let slot = self.states.slot(plugin.name())?;
        let mut state = lock(&slot, plugin.name())?;
        plugin.run(&mut state, servers, constraints)
    }

    fn post_plugin(
        &self,
        plugin: &dyn Plugin,
        servers: &[Server],
        chosen: Option<&Server>,
        constraints: &Constraints,
    ) -> EngineResult<()> {
        let slot = self.states.slot(plugin.name())?;
        let mut state = lock(&slot, plugin.name())?;
        plugin.post(&mut state, servers, chosen, constraints)
    }
}

//! Plugin registry — maps configured names to plugin instances.
//!
//! Chains are resolved once, up front. A name the registry doesn't know
//! fails resolution instead of being skipped at request time.

use std::collections::BTreeMap;
use std::sync::Arc;

use hostalloc_core::Tuning;

use crate::adapters::{RecentVms, TicketedVms};
use crate::error::{EngineError, EngineResult};
use crate::filters::{
    MinCpu, MinDisk, MinRam, NicTags, OverprovisionRatios, OwnerSameRacks, OwnerSameServers,
    Reserved, Running, Setup, SickServers, VmCount,
};
use crate::pickers::{PickFirst, PickRandom, WeightedRandom};
use crate::plugin::Plugin;
use crate::rankers::{SortMaxRam, SortMinOwner, SortMinRam, SortRandom, SortServerSpread, SortTwoAdic};
use crate::shapers::{LargeServers, OwnerManyZones, RecentServers};

#[derive(Default)]
pub struct Registry {
    plugins: BTreeMap<&'static str, Arc<dyn Plugin>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in plugin, configured from `tuning`.
    pub fn builtin(tuning: &Tuning) -> Self {
        let mut registry = Self::new();

        // Adapters
        registry.register(Arc::new(RecentVms::new(tuning.recent_vm_window_secs)));
        registry.register(Arc::new(TicketedVms));

        // Hard filters
        registry.register(Arc::new(Setup));
        registry.register(Arc::new(Running));
        registry.register(Arc::new(Reserved));
        registry.register(Arc::new(VmCount::new(tuning.vm_count_limit)));
        registry.register(Arc::new(NicTags));
        registry.register(Arc::new(OverprovisionRatios));
        registry.register(Arc::new(SickServers::new(tuning.sick_window_secs)));
        registry.register(Arc::new(OwnerSameServers));
        registry.register(Arc::new(OwnerSameRacks));
        registry.register(Arc::new(MinRam));
        registry.register(Arc::new(MinCpu));
        registry.register(Arc::new(MinDisk));

        // Soft filters
        registry.register(Arc::new(LargeServers::new(
            tuning.large_server_fraction,
            tuning.large_request_threshold_mib,
        )));
        registry.register(Arc::new(OwnerManyZones::new(tuning.owner_zone_fraction)));
        registry.register(Arc::new(RecentServers::new(
            tuning.recent_server_window_ms,
            tuning.recent_server_max_fraction,
        )));

        // Rankers
        registry.register(Arc::new(SortMaxRam));
        registry.register(Arc::new(SortMinRam));
        registry.register(Arc::new(SortRandom));
        registry.register(Arc::new(SortMinOwner));
        registry.register(Arc::new(SortTwoAdic));
        registry.register(Arc::new(SortServerSpread));

        // Pickers
        registry.register(Arc::new(PickFirst));
        registry.register(Arc::new(PickRandom));
        registry.register(Arc::new(WeightedRandom::new(tuning.weighted_pick_fraction)));

        registry
    }

    /// Add or replace a plugin under its own name.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.insert(plugin.name(), plugin);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name).cloned()
    }

    /// Resolve an ordered chain of names, failing on the first unknown one.
    pub fn resolve(&self, names: &[String]) -> EngineResult<Vec<Arc<dyn Plugin>>> {
        names
            .iter()
            .map(|name| {
                self.get(name)
                    .ok_or_else(|| EngineError::UnknownPlugin(name.clone()))
            })
            .collect()
    }

    /// (name, description) of every registered plugin, sorted by name.
    pub fn describe(&self) -> Vec<(&'static str, &'static str)> {
        self.plugins
            .values()
            .map(|p| (p.name(), p.description()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

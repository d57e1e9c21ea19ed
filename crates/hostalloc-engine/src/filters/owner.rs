//! Owner anti-affinity — keep an owner's VMs apart.

use std::collections::HashSet;

use hostalloc_core::{Constraints, Server};

use crate::error::EngineResult;
use crate::plugin::{Plugin, Step, retain_with_reasons};
use crate::state::PluginState;

/// Exclude servers already hosting a VM of the requesting owner.
pub struct OwnerSameServers;

impl Plugin for OwnerSameServers {
    fn name(&self) -> &'static str {
        "hard-filter-owner-same-servers"
    }

    fn description(&self) -> &'static str {
        "Remove servers that already host one of the owner's VMs"
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step> {
        let owner = constraints.vm.owner_uuid.as_str();
        Ok(retain_with_reasons(servers, |server| {
            server
                .hosts_owner(owner)
                .then(|| format!("Server already hosts a VM of owner {owner}"))
        }))
    }
}

/// Exclude every server in a rack that holds any VM of the requesting
/// owner, including servers in that rack with no VMs of their own.
pub struct OwnerSameRacks;

impl Plugin for OwnerSameRacks {
    fn name(&self) -> &'static str {
        "hard-filter-owner-same-racks"
    }

    fn description(&self) -> &'static str {
        "Remove servers in racks that already host one of the owner's VMs"
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step> {
        let owner = constraints.vm.owner_uuid.as_str();
        let racks: HashSet<String> = servers
            .iter()
            .filter(|s| s.hosts_owner(owner))
            .filter_map(|s| s.rack_identifier.clone())
            .collect();

        Ok(retain_with_reasons(servers, |server| {
            let rack = server.rack_identifier.as_ref()?;
            racks
                .contains(rack)
                .then(|| format!("Rack {rack} already hosts a VM of owner {owner}"))
        }))
    }
}

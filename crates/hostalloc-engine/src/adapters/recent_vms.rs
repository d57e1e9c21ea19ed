//! Recently-allocated VMs — remember what this process just placed.
//!
//! Every successful allocation is logged in the plugin's state. On each
//! request the log is purged of entries older than the window, and what
//! remains is spliced into the matching servers as phantom VMs, until
//! the feed has had time to report them itself.

use hostalloc_core::{Constraints, Server, ServerUuid, Vm, VmOrigin, VmState};
use tracing::debug;

use crate::adapters::splice_phantom;
use crate::error::EngineResult;
use crate::plugin::{Plugin, Step};
use crate::state::PluginState;

/// A VM this process placed, and when.
#[derive(Debug, Clone)]
struct RecentVm {
    server_uuid: ServerUuid,
    vm: Vm,
    disks_mib: Vec<u64>,
    created_ms: u64,
}

#[derive(Debug, Default)]
struct RecentVmLog {
    entries: Vec<RecentVm>,
}

impl RecentVmLog {
    fn purge(&mut self, now_ms: u64, window_ms: u64) {
        let before = self.entries.len();
        self.entries
            .retain(|e| now_ms.saturating_sub(e.created_ms) <= window_ms);
        let purged = before - self.entries.len();
        if purged > 0 {
            debug!(purged, remaining = self.entries.len(), "purged expired recent VMs");
        }
    }
}

pub struct RecentVms {
    window_ms: u64,
}

impl RecentVms {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_ms: window_secs * 1000,
        }
    }
}

impl Plugin for RecentVms {
    fn name(&self) -> &'static str {
        "calculate-recent-vms"
    }

    fn description(&self) -> &'static str {
        "Add VMs recently placed by this process that the feed does not show yet"
    }

    fn affects_capacity(&self) -> bool {
        true
    }

    fn run(
        &self,
        state: &mut PluginState,
        mut servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step> {
        let log = state.get_or_default::<RecentVmLog>();
        log.purge(constraints.now_ms, self.window_ms);

        let mut spliced = 0;
        for server in &mut servers {
            let uuid = server.uuid.clone();
            for entry in log.entries.iter().filter(|e| e.server_uuid == uuid) {
                if splice_phantom(server, entry.vm.clone(), &entry.disks_mib) {
                    spliced += 1;
                }
            }
        }
        if spliced > 0 {
            debug!(spliced, "added recently allocated VMs");
        }

        Ok(Step::new(servers))
    }

    fn post(
        &self,
        state: &mut PluginState,
        _servers: &[Server],
        chosen: Option<&Server>,
        constraints: &Constraints,
    ) -> EngineResult<()> {
        let Some(server) = chosen else { return Ok(()) };
        if !constraints.track_allocation {
            return Ok(());
        }

        let req = &constraints.vm;
        let vm = Vm {
            uuid: req.uuid.clone(),
            owner_uuid: req.owner_uuid.clone(),
            max_physical_memory_mib: req.ram_mib,
            cpu_cap: req.cpu_cap,
            quota_mib: req.quota_mib,
            brand: req.brand,
            state: VmState::Provisioning,
            last_modified_ms: constraints.now_ms,
            origin: VmOrigin::Recent,
        };

        let log = state.get_or_default::<RecentVmLog>();
        log.entries.retain(|e| e.vm.uuid != vm.uuid);
        log.entries.push(RecentVm {
            server_uuid: server.uuid.clone(),
            vm,
            disks_mib: req.disks_mib.clone(),
            created_ms: constraints.now_ms,
        });
        debug!(server = %server.uuid, vm = %req.uuid, "recorded recent allocation");

        Ok(())
    }
}

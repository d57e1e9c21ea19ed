//! Sick servers — skip hosts whose last two provisions both failed.

use hostalloc_core::{Constraints, Server, Vm, VmState};

use crate::error::EngineResult;
use crate::plugin::{Plugin, Step, retain_with_reasons};
use crate::state::PluginState;

pub struct SickServers {
    window_ms: u64,
}

impl SickServers {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_ms: window_secs * 1000,
        }
    }

    /// The two most recently modified VMs inside the window, if both failed.
    fn failed_pair<'a>(&self, server: &'a Server, now_ms: u64) -> Option<(&'a Vm, &'a Vm)> {
        let mut recent: Vec<&Vm> = server
            .vms
            .values()
            .filter(|vm| now_ms.saturating_sub(vm.last_modified_ms) <= self.window_ms)
            .collect();
        recent.sort_by(|a, b| {
            b.last_modified_ms
                .cmp(&a.last_modified_ms)
                .then_with(|| a.uuid.cmp(&b.uuid))
        });

        match recent.as_slice() {
            [first, second, ..]
                if first.state == VmState::Failed && second.state == VmState::Failed =>
            {
                Some((*first, *second))
            }
            _ => None,
        }
    }
}

impl Plugin for SickServers {
    fn name(&self) -> &'static str {
        "hard-filter-sick-servers"
    }

    fn description(&self) -> &'static str {
        "Remove servers whose two most recent VMs both failed"
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step> {
        Ok(retain_with_reasons(servers, |server| {
            self.failed_pair(server, constraints.now_ms).map(|(a, b)| {
                format!("Server's two most recent VMs {} and {} both failed", a.uuid, b.uuid)
            })
        }))
    }
}

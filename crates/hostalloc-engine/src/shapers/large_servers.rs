//! Large-allocation pool.
//!
//! The servers with the most free RAM are held back for requests too big
//! to fit anywhere else. Large requests may only use that pool; everything
//! else may only use the rest.

use std::collections::HashSet;

use hostalloc_core::{Constraints, Server};
use tracing::debug;

use crate::capacity::available_ram_mib;
use crate::error::EngineResult;
use crate::plugin::{Plugin, Step, fraction_of, retain_with_reasons};
use crate::state::PluginState;

pub struct LargeServers {
    fraction: f64,
    threshold_mib: u64,
}

impl LargeServers {
    pub fn new(fraction: f64, threshold_mib: u64) -> Self {
        Self {
            fraction,
            threshold_mib,
        }
    }
}

impl Plugin for LargeServers {
    fn name(&self) -> &'static str {
        "soft-filter-large-servers"
    }

    fn description(&self) -> &'static str {
        "Reserve the servers with the most free RAM for large requests"
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step> {
        // A lone candidate would leave one side of the partition empty.
        if !constraints.defaults.filter_large_servers || servers.len() < 2 {
            return Ok(Step::new(servers));
        }

        let mut by_ram: Vec<(i64, &str)> = servers
            .iter()
            .map(|s| (available_ram_mib(s), s.uuid.as_str()))
            .collect();
        by_ram.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        let reserved_count = fraction_of(servers.len(), self.fraction);
        let reserved: HashSet<String> = by_ram[..reserved_count]
            .iter()
            .map(|(_, uuid)| uuid.to_string())
            .collect();

        let large = constraints.vm.ram_mib > self.threshold_mib;
        debug!(large, reserved = reserved_count, "partitioned large-server pool");

        Ok(retain_with_reasons(servers, |server| {
            let in_pool = reserved.contains(&server.uuid);
            match (large, in_pool) {
                (true, false) => {
                    Some("Server is not reserved for large allocations".to_string())
                }
                (false, true) => Some("Server is reserved for large allocations".to_string()),
                _ => None,
            }
        }))
    }
}

//! Resource filters — drop servers without room for the request.

use hostalloc_core::{Constraints, Server};

use crate::capacity::{available_cpu, available_disk_mib, available_ram_mib, disk_demand_mib};
use crate::error::EngineResult;
use crate::plugin::{Plugin, Step, retain_with_reasons};
use crate::state::PluginState;

/// Exclude servers whose free RAM is below the requested RAM.
pub struct MinRam;

impl Plugin for MinRam {
    fn name(&self) -> &'static str {
        "hard-filter-min-ram"
    }

    fn description(&self) -> &'static str {
        "Remove servers with less free RAM than requested"
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step> {
        if !constraints.defaults.filter_min_resources {
            return Ok(Step::new(servers));
        }
        let requested = constraints.vm.ram_mib as i64;
        Ok(retain_with_reasons(servers, |server| {
            let free = available_ram_mib(server);
            (free < requested).then(|| {
                format!("Server has {free} MiB of RAM free, {requested} MiB requested")
            })
        }))
    }
}

/// Exclude servers whose free CPU is below the requested cap.
///
/// Uncapped requests pass everywhere.
pub struct MinCpu;

impl Plugin for MinCpu {
    fn name(&self) -> &'static str {
        "hard-filter-min-cpu"
    }

    fn description(&self) -> &'static str {
        "Remove servers with less free CPU than the requested cap"
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step> {
        let Some(cap) = constraints.vm.cpu_cap else {
            return Ok(Step::new(servers));
        };
        if !constraints.defaults.filter_min_resources {
            return Ok(Step::new(servers));
        }
        let requested = i64::from(cap);
        Ok(retain_with_reasons(servers, |server| {
            let free = available_cpu(server);
            (free < requested)
                .then(|| format!("Server has {free} CPU free, cap of {requested} requested"))
        }))
    }
}

/// Exclude servers without disk for the request's quota and volumes.
pub struct MinDisk;

impl Plugin for MinDisk {
    fn name(&self) -> &'static str {
        "hard-filter-min-disk"
    }

    fn description(&self) -> &'static str {
        "Remove servers with less free disk than requested"
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step> {
        if !constraints.defaults.filter_min_resources {
            return Ok(Step::new(servers));
        }
        let requested = disk_demand_mib(&constraints.vm) as i64;
        Ok(retain_with_reasons(servers, |server| {
            let free = available_disk_mib(server);
            (free < requested).then(|| {
                format!("Server has {free} MiB of disk free, {requested} MiB requested")
            })
        }))
    }
}

/// Exclude servers already carrying the maximum number of VMs.
pub struct VmCount {
    limit: usize,
}

impl VmCount {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl Plugin for VmCount {
    fn name(&self) -> &'static str {
        "hard-filter-vm-count"
    }

    fn description(&self) -> &'static str {
        "Remove servers at the VM count limit"
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        _constraints: &Constraints,
    ) -> EngineResult<Step> {
        let limit = self.limit;
        Ok(retain_with_reasons(servers, |server| {
            let count = server.vms.len();
            (count >= limit).then(|| format!("Server has {count} VMs, limit is {limit}"))
        }))
    }
}

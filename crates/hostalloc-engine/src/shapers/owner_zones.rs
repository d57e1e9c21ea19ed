//! Owner footprint minimization — prefer servers where the requesting
//! owner has the fewest VMs.

use hostalloc_core::{Constraints, Server};

use crate::error::EngineResult;
use crate::plugin::{Plugin, Reasons, Step, fraction_of};
use crate::state::PluginState;

pub struct OwnerManyZones {
    fraction: f64,
}

impl OwnerManyZones {
    pub fn new(fraction: f64) -> Self {
        Self { fraction }
    }
}

impl Plugin for OwnerManyZones {
    fn name(&self) -> &'static str {
        "soft-filter-owner-many-zones"
    }

    fn description(&self) -> &'static str {
        "Keep the quarter of servers holding the fewest of the owner's VMs"
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step> {
        let owner = constraints.vm.owner_uuid.as_str();
        let counts: Vec<usize> = servers.iter().map(|s| s.owner_vm_count(owner)).collect();

        let mut order: Vec<usize> = (0..servers.len()).collect();
        order.sort_by_key(|&i| counts[i]);
        let mut keep = vec![false; servers.len()];
        for &i in order.iter().take(fraction_of(servers.len(), self.fraction)) {
            keep[i] = true;
        }

        let mut kept = Vec::new();
        let mut reasons = Reasons::new();
        for (i, server) in servers.into_iter().enumerate() {
            if keep[i] {
                kept.push(server);
            } else {
                reasons.insert(
                    server.uuid.clone(),
                    format!(
                        "Server hosts {} VMs of owner {owner}; servers with fewer were preferred",
                        counts[i]
                    ),
                );
            }
        }

        Ok(Step::with_reasons(kept, reasons))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostalloc_core::{Vm, VmRequest};

    fn server(id: &str, alice_vms: usize) -> Server {
        let mut s = Server::new(id, 4, 1 << 34).with_vm(Vm::new(format!("{id}-bob"), "bob", 128));
        for i in 0..alice_vms {
            s = s.with_vm(Vm::new(format!("{id}-{i}"), "alice", 128));
        }
        s
    }

    fn run(servers: Vec<Server>) -> Step {
        let c = Constraints::new(VmRequest::new("vm", "alice", 128));
        OwnerManyZones::new(0.25)
            .run(&mut PluginState::default(), servers, &c)
            .unwrap()
    }

    #[test]
    fn keeps_lowest_quartile_in_input_order() {
        let servers = vec![
            server("a", 3),
            server("b", 0),
            server("c", 5),
            server("d", 1),
            server("e", 0),
            server("f", 2),
            server("g", 4),
            server("h", 6),
        ];

        let step = run(servers);
        let ids: Vec<&str> = step.servers.iter().map(|s| s.uuid.as_str()).collect();
        assert_eq!(ids, vec!["b", "e"]);
        assert_eq!(step.reasons.len(), 6);
        assert!(step.reasons["c"].starts_with("Server hosts 5 VMs of owner alice"));
    }

    #[test]
    fn keeps_at_least_one_server() {
        let step = run(vec![server("a", 2), server("b", 1)]);
        assert_eq!(step.servers.len(), 1);
        assert_eq!(step.servers[0].uuid, "b");
    }

    #[test]
    fn ties_keep_the_earlier_server() {
        let step = run(vec![server("a", 1), server("b", 1), server("c", 1), server("d", 1)]);
        assert_eq!(step.servers[0].uuid, "a");
    }
}

//! Ticketed VMs — account for provisions that are queued or running
//! elsewhere in the system but not yet visible in the feed.

use std::collections::HashMap;

use hostalloc_core::{Constraints, Server, Ticket, TicketStatus, Vm, VmOrigin, VmState};
use tracing::debug;

use crate::adapters::splice_phantom;
use crate::error::EngineResult;
use crate::plugin::{Plugin, Reasons, Step};
use crate::state::PluginState;

pub struct TicketedVms;

/// Open VM provision tickets, grouped by target server.
fn open_provisions(tickets: &[Ticket]) -> HashMap<&str, Vec<&Ticket>> {
    let mut by_server: HashMap<&str, Vec<&Ticket>> = HashMap::new();
    for ticket in tickets {
        let open = matches!(ticket.status, TicketStatus::Queued | TicketStatus::Active);
        if ticket.scope == "vm" && ticket.action == "provision" && open {
            by_server
                .entry(ticket.server_uuid.as_str())
                .or_default()
                .push(ticket);
        }
    }
    by_server
}

/// The phantom VM described by a ticket, if its metadata is complete.
fn ticket_vm(ticket: &Ticket, now_ms: u64) -> Option<(Vm, &[u64])> {
    let meta = ticket.vm.as_ref()?;
    let vm = Vm {
        uuid: meta.vm_uuid.clone()?,
        owner_uuid: meta.owner_uuid.clone()?,
        max_physical_memory_mib: meta.ram_mib?,
        cpu_cap: meta.cpu_cap,
        quota_mib: meta.quota_mib,
        brand: meta.brand,
        state: VmState::Provisioning,
        last_modified_ms: now_ms,
        origin: VmOrigin::Ticket,
    };
    Some((vm, meta.disks_mib.as_slice()))
}

impl Plugin for TicketedVms {
    fn name(&self) -> &'static str {
        "calculate-ticketed-vms"
    }

    fn description(&self) -> &'static str {
        "Add VMs with open provisioning tickets; exclude servers with opaque tickets"
    }

    fn affects_capacity(&self) -> bool {
        true
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step> {
        let open = open_provisions(&constraints.tickets);
        if open.is_empty() {
            return Ok(Step::new(servers));
        }

        let mut kept = Vec::with_capacity(servers.len());
        let mut reasons = Reasons::new();

        'servers: for mut server in servers {
            let Some(tickets) = open.get(server.uuid.as_str()) else {
                kept.push(server);
                continue;
            };

            let mut phantoms = Vec::with_capacity(tickets.len());
            for ticket in tickets {
                match ticket_vm(ticket, constraints.now_ms) {
                    Some(phantom) => phantoms.push(phantom),
                    None => {
                        reasons.insert(
                            server.uuid.clone(),
                            format!(
                                "Server has open provision ticket {} without VM details",
                                ticket.id
                            ),
                        );
                        continue 'servers;
                    }
                }
            }

            for (vm, disks) in phantoms {
                let uuid = vm.uuid.clone();
                if splice_phantom(&mut server, vm, disks) {
                    debug!(server = %server.uuid, vm = %uuid, "added ticketed VM");
                }
            }
            kept.push(server);
        }

        Ok(Step::with_reasons(kept, reasons))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostalloc_core::{Brand, MIB, TicketVm, VmRequest};

    fn ticket(id: &str, server: &str, status: TicketStatus, vm: Option<TicketVm>) -> Ticket {
        Ticket {
            id: id.to_string(),
            scope: "vm".to_string(),
            action: "provision".to_string(),
            status,
            server_uuid: server.to_string(),
            vm,
        }
    }

    fn full_meta(vm_uuid: &str) -> TicketVm {
        TicketVm {
            vm_uuid: Some(vm_uuid.to_string()),
            owner_uuid: Some("owner".to_string()),
            ram_mib: Some(4096),
            cpu_cap: Some(200),
            quota_mib: 0,
            brand: Brand::Bhyve,
            disks_mib: vec![8 * 1024, 100],
        }
    }

    fn servers() -> Vec<Server> {
        vec![
            Server::new("s1", 8, 64 * 1024 * MIB),
            Server::new("s2", 8, 64 * 1024 * MIB),
        ]
    }

    fn run(tickets: Vec<Ticket>) -> Step {
        let mut c = Constraints::new(VmRequest::new("new", "owner", 1024));
        c.tickets = tickets;
        TicketedVms
            .run(&mut PluginState::default(), servers(), &c)
            .unwrap()
    }

    #[test]
    fn open_tickets_become_phantom_vms() {
        let step = run(vec![
            ticket("t1", "s1", TicketStatus::Queued, Some(full_meta("a"))),
            ticket("t2", "s1", TicketStatus::Active, Some(full_meta("b"))),
        ]);

        assert_eq!(step.servers.len(), 2);
        assert!(step.reasons.is_empty());
        let s1 = &step.servers[0];
        assert_eq!(s1.vms.len(), 2);
        assert_eq!(s1.vms["a"].origin, VmOrigin::Ticket);
        // 8292 MiB of disks rounds up to 9 GiB, per VM.
        assert_eq!(s1.disk.kvm_zvol_volsize_bytes, 2 * 9 * 1024 * MIB);
    }

    #[test]
    fn closed_and_foreign_tickets_are_ignored() {
        let mut other_scope = ticket("t3", "s1", TicketStatus::Queued, Some(full_meta("c")));
        other_scope.scope = "image".to_string();
        let mut other_action = ticket("t4", "s1", TicketStatus::Queued, Some(full_meta("d")));
        other_action.action = "destroy".to_string();

        let step = run(vec![
            ticket("t1", "s1", TicketStatus::Finished, Some(full_meta("a"))),
            ticket("t2", "s2", TicketStatus::Expired, None),
            other_scope,
            other_action,
        ]);

        assert!(step.servers.iter().all(|s| s.vms.is_empty()));
        assert!(step.reasons.is_empty());
    }

    #[test]
    fn opaque_ticket_excludes_whole_server() {
        let mut partial = full_meta("b");
        partial.ram_mib = None;

        let step = run(vec![
            ticket("t1", "s1", TicketStatus::Queued, Some(full_meta("a"))),
            ticket("t2", "s1", TicketStatus::Active, Some(partial)),
            ticket("t3", "s2", TicketStatus::Queued, Some(full_meta("c"))),
        ]);

        let kept: Vec<&str> = step.servers.iter().map(|s| s.uuid.as_str()).collect();
        assert_eq!(kept, vec!["s2"]);
        assert!(step.reasons["s1"].contains("t2"));
    }

    #[test]
    fn missing_metadata_excludes_server() {
        let step = run(vec![ticket("t1", "s2", TicketStatus::Queued, None)]);
        assert_eq!(step.servers.len(), 1);
        assert!(step.reasons.contains_key("s2"));
    }
}

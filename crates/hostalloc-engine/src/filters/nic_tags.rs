//! NIC-tag requirements — the server must reach every requested network.
//!
//! Requirements are alternative groups: a network needs its one tag, a
//! network pool accepts any of its members. A group is satisfied when at
//! least one of its tags is provided by an interface, physical or
//! overlay, whose link is up.

use hostalloc_core::{Constraints, Nic, Server};

use crate::error::EngineResult;
use crate::plugin::{Plugin, Step, retain_with_reasons};
use crate::state::PluginState;

pub struct NicTags;

/// Why `nics` can't satisfy `group`, or `None` if it can.
fn unsatisfied(nics: &[Nic], group: &[String]) -> Option<String> {
    let mut first_down: Option<(&Nic, &str)> = None;

    for tag in group {
        for nic in nics.iter().filter(|n| n.provides(tag)) {
            if nic.link_up {
                return None;
            }
            first_down.get_or_insert((nic, tag.as_str()));
        }
    }

    match first_down {
        Some((nic, tag)) => Some(format!("NIC {} for tag \"{tag}\" is down", nic.name)),
        None => Some(format!("Server is missing NIC tag \"{}\"", group[0])),
    }
}

impl Plugin for NicTags {
    fn name(&self) -> &'static str {
        "hard-filter-vlans"
    }

    fn description(&self) -> &'static str {
        "Remove servers that cannot reach the requested NIC tags"
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step> {
        let groups: Vec<&[String]> = constraints
            .vm
            .nic_tag_requirements
            .iter()
            .filter(|g| !g.is_empty())
            .map(Vec::as_slice)
            .collect();
        if groups.is_empty() {
            return Ok(Step::new(servers));
        }

        Ok(retain_with_reasons(servers, |server| {
            let Some(nics) = server.nics.as_deref() else {
                return Some("Server has no NIC information".to_string());
            };
            groups.iter().find_map(|group| unsatisfied(nics, group))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostalloc_core::VmRequest;

    fn server(id: &str, nics: Vec<Nic>) -> Server {
        let mut s = Server::new(id, 4, 1 << 34);
        s.nics = Some(nics);
        s
    }

    fn run(servers: Vec<Server>, groups: &[&[&str]]) -> Step {
        let mut c = Constraints::new(VmRequest::new("vm", "owner", 128));
        c.vm.nic_tag_requirements = groups
            .iter()
            .map(|g| g.iter().map(|t| t.to_string()).collect())
            .collect();
        NicTags.run(&mut PluginState::default(), servers, &c).unwrap()
    }

    #[test]
    fn down_interface_is_reported() {
        let s = server("s1", vec![Nic::physical("ixgbe0", false, &["admin"])]);

        let step = run(vec![s], &[&["admin"]]);
        assert!(step.servers.is_empty());
        assert_eq!(step.reasons["s1"], "NIC ixgbe0 for tag \"admin\" is down");
    }

    #[test]
    fn no_requirements_means_no_exclusions() {
        let mut bare = Server::new("bare", 4, 1 << 34);
        bare.nics = None;
        let s = server("s1", vec![Nic::physical("ixgbe0", false, &["admin"])]);

        let step = run(vec![bare, s], &[]);
        assert_eq!(step.servers.len(), 2);
        assert!(step.reasons.is_empty());
    }

    #[test]
    fn missing_tag_names_first_tag_of_group() {
        let s = server("s1", vec![Nic::physical("ixgbe0", true, &["admin"])]);

        let step = run(vec![s], &[&["admin"], &["external", "external2"]]);
        assert_eq!(step.reasons["s1"], "Server is missing NIC tag \"external\"");
    }

    #[test]
    fn any_tag_of_a_pool_satisfies_it() {
        let s = server(
            "s1",
            vec![
                Nic::physical("ixgbe0", true, &["admin"]),
                Nic::physical("ixgbe1", false, &["external"]),
                Nic::physical("ixgbe2", true, &["external2"]),
            ],
        );

        let step = run(vec![s], &[&["admin"], &["external", "external2"]]);
        assert_eq!(step.servers.len(), 1);
    }

    #[test]
    fn up_overlay_interface_satisfies_tag() {
        let s = server(
            "s1",
            vec![
                Nic::physical("ixgbe0", true, &["admin", "underlay"]),
                Nic::overlay("sdc_overlay", true, &["sdc_overlay"]),
            ],
        );

        let step = run(vec![s], &[&["sdc_overlay"]]);
        assert_eq!(step.servers.len(), 1);
    }

    #[test]
    fn one_up_carrier_is_enough() {
        let s = server(
            "s1",
            vec![
                Nic::physical("ixgbe0", false, &["external"]),
                Nic::physical("aggr0", true, &["external"]),
            ],
        );

        assert_eq!(run(vec![s], &[&["external"]]).servers.len(), 1);
    }

    #[test]
    fn missing_nic_inventory_has_its_own_reason() {
        let mut s = Server::new("s1", 4, 1 << 34);
        s.nics = None;

        let step = run(vec![s], &[&["admin"]]);
        assert_eq!(step.reasons["s1"], "Server has no NIC information");
    }
}

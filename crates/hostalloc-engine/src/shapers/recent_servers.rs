//! Recent-allocation avoidance.
//!
//! Concurrent requests tend to agree on the same "best" server. Servers
//! this process allocated to within the last few seconds are treated as
//! hot and skipped, most recent first, without ever dropping more than a
//! bounded share of the candidates.

use std::collections::HashMap;

use hostalloc_core::{Constraints, Server, ServerUuid};
use tracing::debug;

use crate::error::EngineResult;
use crate::plugin::{Plugin, Step, retain_with_reasons};
use crate::state::PluginState;

/// Server uuid → last allocation time (epoch ms).
#[derive(Debug, Default)]
struct HotServers {
    last_used: HashMap<ServerUuid, u64>,
}

pub struct RecentServers {
    window_ms: u64,
    max_fraction: f64,
}

impl RecentServers {
    pub fn new(window_ms: u64, max_fraction: f64) -> Self {
        Self {
            window_ms,
            max_fraction,
        }
    }
}

impl Plugin for RecentServers {
    fn name(&self) -> &'static str {
        "soft-filter-recent-servers"
    }

    fn description(&self) -> &'static str {
        "Skip servers allocated to in the last few seconds"
    }

    fn run(
        &self,
        state: &mut PluginState,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step> {
        let now = constraints.now_ms;
        let hot = state.get_or_default::<HotServers>();
        hot.last_used
            .retain(|_, &mut at| now.saturating_sub(at) <= self.window_ms);

        let mut candidates: Vec<(u64, &str)> = servers
            .iter()
            .filter_map(|s| hot.last_used.get(&s.uuid).map(|&at| (at, s.uuid.as_str())))
            .collect();
        candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        let max_remove = (servers.len() as f64 * self.max_fraction).floor() as usize;
        let dropped: HashMap<String, u64> = candidates
            .iter()
            .take(max_remove)
            .map(|&(at, uuid)| (uuid.to_string(), at))
            .collect();
        if !dropped.is_empty() {
            debug!(hot = candidates.len(), dropped = dropped.len(), "skipping hot servers");
        }

        Ok(retain_with_reasons(servers, |server| {
            dropped.get(&server.uuid).map(|&at| {
                format!("Server was allocated to {} ms ago", now.saturating_sub(at))
            })
        }))
    }

    fn post(
        &self,
        state: &mut PluginState,
        _servers: &[Server],
        chosen: Option<&Server>,
        constraints: &Constraints,
    ) -> EngineResult<()> {
        if let Some(server) = chosen.filter(|_| constraints.track_allocation) {
            state
                .get_or_default::<HotServers>()
                .last_used
                .insert(server.uuid.clone(), constraints.now_ms);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostalloc_core::VmRequest;
    use std::collections::HashSet;

    const NOW: u64 = 1_700_000_000_000;

    fn servers(n: usize) -> Vec<Server> {
        (0..n).map(|i| Server::new(format!("s{i}"), 4, 1 << 34)).collect()
    }

    fn at(now_ms: u64) -> Constraints {
        let mut c = Constraints::new(VmRequest::new("vm", "owner", 128));
        c.now_ms = now_ms;
        c
    }

    fn touch(plugin: &RecentServers, state: &mut PluginState, id: &str, now_ms: u64) {
        let server = Server::new(id, 4, 1 << 34);
        plugin.post(state, &[], Some(&server), &at(now_ms)).unwrap();
    }

    fn hot_servers(state: &mut PluginState) -> HashSet<ServerUuid> {
        state
            .get_or_default::<HotServers>()
            .last_used
            .keys()
            .cloned()
            .collect()
    }

    fn ids(step: &Step) -> Vec<&str> {
        step.servers.iter().map(|s| s.uuid.as_str()).collect()
    }

    #[test]
    fn hot_servers_are_skipped() {
        let plugin = RecentServers::new(5_000, 0.25);
        let mut state = PluginState::default();
        touch(&plugin, &mut state, "s2", NOW - 1_000);

        let step = plugin.run(&mut state, servers(4), &at(NOW)).unwrap();
        assert_eq!(ids(&step), vec!["s0", "s1", "s3"]);
        assert_eq!(step.reasons["s2"], "Server was allocated to 1000 ms ago");
    }

    #[test]
    fn most_recent_are_dropped_first_up_to_the_bound() {
        let plugin = RecentServers::new(5_000, 0.25);
        let mut state = PluginState::default();
        touch(&plugin, &mut state, "s0", NOW - 3_000);
        touch(&plugin, &mut state, "s1", NOW - 1_000);
        touch(&plugin, &mut state, "s2", NOW - 2_000);

        // 25% of 8 candidates: at most two dropped.
        let step = plugin.run(&mut state, servers(8), &at(NOW)).unwrap();
        assert_eq!(step.reasons.len(), 2);
        assert!(step.reasons.contains_key("s1"));
        assert!(step.reasons.contains_key("s2"));
        assert!(ids(&step).contains(&"s0"));
    }

    #[test]
    fn entries_expire_after_window() {
        let plugin = RecentServers::new(5_000, 0.25);
        let mut state = PluginState::default();
        touch(&plugin, &mut state, "s1", NOW - 6_000);

        let step = plugin.run(&mut state, servers(4), &at(NOW)).unwrap();
        assert_eq!(step.servers.len(), 4);
        assert!(hot_servers(&mut state).is_empty());
    }

    #[test]
    fn small_candidate_lists_are_never_emptied() {
        let plugin = RecentServers::new(5_000, 0.25);
        let mut state = PluginState::default();
        touch(&plugin, &mut state, "s0", NOW);

        let step = plugin.run(&mut state, servers(1), &at(NOW)).unwrap();
        assert_eq!(step.servers.len(), 1);
    }

    #[test]
    fn post_records_only_real_choices() {
        let plugin = RecentServers::new(5_000, 0.25);
        let mut state = PluginState::default();

        plugin.post(&mut state, &[], None, &at(NOW)).unwrap();
        let mut untracked = at(NOW);
        untracked.track_allocation = false;
        plugin
            .post(&mut state, &[], Some(&Server::new("s0", 4, 1)), &untracked)
            .unwrap();
        assert!(hot_servers(&mut state).is_empty());

        touch(&plugin, &mut state, "s3", NOW);
        assert!(hot_servers(&mut state).contains("s3"));
    }
}

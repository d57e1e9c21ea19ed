//! Pickers — reduce an ordered candidate list to a single server.

use hostalloc_core::{Constraints, Server};
use rand::Rng;

use crate::error::EngineResult;
use crate::plugin::{Plugin, Step, fraction_of};
use crate::state::PluginState;

/// Take the server at a uniformly random index below `bound`.
fn pick_below(mut servers: Vec<Server>, bound: usize) -> Step {
    if servers.is_empty() {
        return Step::new(servers);
    }
    let index = rand::rng().random_range(0..bound.min(servers.len()));
    Step::new(vec![servers.swap_remove(index)])
}

pub struct PickFirst;

impl Plugin for PickFirst {
    fn name(&self) -> &'static str {
        "pick-first"
    }

    fn description(&self) -> &'static str {
        "Choose the first remaining server"
    }

    fn run(
        &self,
        _state: &mut PluginState,
        mut servers: Vec<Server>,
        _constraints: &Constraints,
    ) -> EngineResult<Step> {
        servers.truncate(1);
        Ok(Step::new(servers))
    }
}

pub struct PickRandom;

impl Plugin for PickRandom {
    fn name(&self) -> &'static str {
        "pick-random"
    }

    fn description(&self) -> &'static str {
        "Choose any remaining server uniformly at random"
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        _constraints: &Constraints,
    ) -> EngineResult<Step> {
        let len = servers.len();
        Ok(pick_below(servers, len))
    }
}

/// Uniform choice among the head of an already ranked list.
///
/// Simultaneous requests ranking the same inventory would otherwise all
/// land on the same top server.
pub struct WeightedRandom {
    fraction: f64,
}

impl WeightedRandom {
    pub fn new(fraction: f64) -> Self {
        Self { fraction }
    }
}

impl Plugin for WeightedRandom {
    fn name(&self) -> &'static str {
        "pick-weighted-random"
    }

    fn description(&self) -> &'static str {
        "Choose at random among the top few percent of ranked servers"
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        _constraints: &Constraints,
    ) -> EngineResult<Step> {
        let top = fraction_of(servers.len(), self.fraction);
        Ok(pick_below(servers, top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostalloc_core::VmRequest;
    use std::collections::HashSet;

    fn servers(n: usize) -> Vec<Server> {
        (0..n).map(|i| Server::new(format!("s{i:03}"), 4, 1 << 34)).collect()
    }

    fn constraints() -> Constraints {
        Constraints::new(VmRequest::new("vm", "owner", 128))
    }

    fn pick(plugin: &dyn Plugin, n: usize) -> Vec<Server> {
        plugin
            .run(&mut PluginState::default(), servers(n), &constraints())
            .unwrap()
            .servers
    }

    #[test]
    fn first_takes_the_head() {
        let chosen = pick(&PickFirst, 5);
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen[0].uuid, "s000");
    }

    #[test]
    fn pickers_tolerate_empty_input() {
        assert!(pick(&PickFirst, 0).is_empty());
        assert!(pick(&PickRandom, 0).is_empty());
        assert!(pick(&WeightedRandom::new(0.05), 0).is_empty());
    }

    #[test]
    fn random_returns_one_of_the_inputs() {
        for _ in 0..50 {
            let chosen = pick(&PickRandom, 7);
            assert_eq!(chosen.len(), 1);
            let index: usize = chosen[0].uuid[1..].parse().unwrap();
            assert!(index < 7);
        }
    }

    #[test]
    fn weighted_random_stays_in_the_top_five_percent() {
        let picker = WeightedRandom::new(0.05);
        let mut seen = HashSet::new();
        for _ in 0..1_000 {
            let chosen = pick(&picker, 100);
            assert_eq!(chosen.len(), 1);
            let index: usize = chosen[0].uuid[1..].parse().unwrap();
            assert!(index < 5, "picked s{index:03} outside the top five");
            seen.insert(index);
        }
        // (4/5)^1000 odds of missing any given slot.
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn weighted_random_on_short_lists_takes_the_head() {
        for _ in 0..20 {
            assert_eq!(pick(&WeightedRandom::new(0.05), 10)[0].uuid, "s000");
        }
    }
}

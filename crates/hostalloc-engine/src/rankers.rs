//! Rankers — order candidates by preference, best first.
//!
//! Every deterministic ranking breaks ties by server uuid so identical
//! inputs always produce identical orders.

use std::cmp::Reverse;

use hostalloc_core::{Constraints, Server, ServerSpread};
use rand::seq::SliceRandom;

use crate::capacity::available_ram_mib;
use crate::error::{EngineError, EngineResult};
use crate::plugin::{Plugin, Step, retain_with_reasons};
use crate::state::PluginState;

/// Stable sort on a per-server key, then uuid.
fn sort_by_key<K: Ord>(servers: &mut Vec<Server>, key: impl Fn(&Server) -> K) {
    let mut keyed: Vec<(K, Server)> = servers.drain(..).map(|s| (key(&s), s)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.uuid.cmp(&b.1.uuid)));
    servers.extend(keyed.into_iter().map(|(_, s)| s));
}

/// 2-adic ranking key for a server with `free_mib` against a request of
/// `requested_mib`.
///
/// The ratio `free / requested` is written in base 2, the bit string is
/// reversed, and the result read as a binary fraction. Reversing a `u64`'s
/// bits yields exactly that fraction in 64-bit fixed point, so keys of
/// different bit lengths compare correctly as plain integers.
pub fn two_adic_key(free_mib: u64, requested_mib: u64) -> u64 {
    (free_mib / requested_mib).reverse_bits()
}

/// Order `servers` according to `spread`.
pub fn rank(
    mut servers: Vec<Server>,
    spread: ServerSpread,
    constraints: &Constraints,
) -> EngineResult<Step> {
    match spread {
        ServerSpread::MaxRam => {
            sort_by_key(&mut servers, |s| Reverse(available_ram_mib(s)));
        }
        ServerSpread::MinRam => sort_by_key(&mut servers, available_ram_mib),
        ServerSpread::Random => servers.shuffle(&mut rand::rng()),
        ServerSpread::MinOwner => {
            let owner = constraints.vm.owner_uuid.as_str();
            sort_by_key(&mut servers, |s| s.owner_vm_count(owner));
        }
        ServerSpread::TwoAdic => return rank_two_adic(servers, constraints),
    }
    Ok(Step::new(servers))
}

fn rank_two_adic(servers: Vec<Server>, constraints: &Constraints) -> EngineResult<Step> {
    let requested = constraints.vm.ram_mib;
    if requested == 0 {
        return Err(EngineError::InvalidRequest(
            "2-adic ranking needs a non-zero RAM request".to_string(),
        ));
    }

    let mut step = retain_with_reasons(servers, |server| {
        let free = available_ram_mib(server);
        (free < requested as i64)
            .then(|| format!("Server has {free} MiB of RAM free, {requested} MiB requested"))
    });
    sort_by_key(&mut step.servers, |s| {
        // Survivors have at least `requested` free, so the cast is lossless.
        Reverse(two_adic_key(available_ram_mib(s) as u64, requested))
    });
    Ok(step)
}

macro_rules! spread_ranker {
    ($ty:ident, $name:literal, $spread:expr, $desc:literal) => {
        pub struct $ty;

        impl Plugin for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn description(&self) -> &'static str {
                $desc
            }

            fn run(
                &self,
                _state: &mut PluginState,
                servers: Vec<Server>,
                constraints: &Constraints,
            ) -> EngineResult<Step> {
                rank(servers, $spread, constraints)
            }
        }
    };
}

spread_ranker!(SortMaxRam, "sort-max-ram", ServerSpread::MaxRam, "Most free RAM first");
spread_ranker!(SortMinRam, "sort-min-ram", ServerSpread::MinRam, "Least free RAM first");
spread_ranker!(SortRandom, "sort-random", ServerSpread::Random, "Uniform random order");
spread_ranker!(
    SortMinOwner,
    "sort-min-owner",
    ServerSpread::MinOwner,
    "Fewest VMs of the requesting owner first"
);
spread_ranker!(
    SortTwoAdic,
    "sort-2adic",
    ServerSpread::TwoAdic,
    "Best 2-adic fit of the request into free RAM first"
);

/// Ranks by the request's spread policy: package hint, else default.
pub struct SortServerSpread;

impl Plugin for SortServerSpread {
    fn name(&self) -> &'static str {
        "sort-server-spread"
    }

    fn description(&self) -> &'static str {
        "Rank by the package's or default server-spread policy"
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step> {
        rank(servers, constraints.server_spread(), constraints)
    }
}

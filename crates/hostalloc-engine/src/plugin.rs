//! The plugin interface every pipeline step implements.

use std::collections::BTreeMap;

use hostalloc_core::{Constraints, Server, ServerUuid};

use crate::error::EngineResult;
use crate::state::PluginState;

/// Server uuid → why it was excluded.
pub type Reasons = BTreeMap<ServerUuid, String>;

/// Output of one pipeline step.
#[derive(Debug, Default)]
pub struct Step {
    pub servers: Vec<Server>,
    pub reasons: Reasons,
}

impl Step {
    pub fn new(servers: Vec<Server>) -> Self {
        Self {
            servers,
            reasons: Reasons::new(),
        }
    }

    pub fn with_reasons(servers: Vec<Server>, reasons: Reasons) -> Self {
        Self { servers, reasons }
    }
}

/// A single decision step in the allocation pipeline.
///
/// `run` receives the previous step's output and returns a subset or
/// reordering of it. `post` runs after a server has been chosen (or not),
/// in reverse chain order, with the full pre-pipeline server list.
pub trait Plugin: Send + Sync {
    /// Registry name, also the key of this plugin's state slot.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Whether this step changes what free capacity looks like. Only
    /// such steps run during a capacity simulation.
    fn affects_capacity(&self) -> bool {
        false
    }

    fn run(
        &self,
        state: &mut PluginState,
        servers: Vec<Server>,
        constraints: &Constraints,
    ) -> EngineResult<Step>;

    fn post(
        &self,
        _state: &mut PluginState,
        _servers: &[Server],
        _chosen: Option<&Server>,
        _constraints: &Constraints,
    ) -> EngineResult<()> {
        Ok(())
    }
}

/// Keep servers for which `reject` returns `None`; record the rest.
pub fn retain_with_reasons<F>(servers: Vec<Server>, mut reject: F) -> Step
where
    F: FnMut(&Server) -> Option<String>,
{
    let mut kept = Vec::with_capacity(servers.len());
    let mut reasons = Reasons::new();
    for server in servers {
        match reject(&server) {
            Some(reason) => {
                reasons.entry(server.uuid.clone()).or_insert(reason);
            }
            None => kept.push(server),
        }
    }
    Step::with_reasons(kept, reasons)
}

/// `fraction` of `len`, floored, but never below one (unless `len` is zero).
pub fn fraction_of(len: usize, fraction: f64) -> usize {
    if len == 0 {
        return 0;
    }
    ((len as f64 * fraction).floor() as usize).clamp(1, len)
}

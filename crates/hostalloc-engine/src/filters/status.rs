//! Status filters — reserved, not set up, or not running.

use hostalloc_core::{Constraints, Server, ServerStatus};

use crate::error::EngineResult;
use crate::plugin::{Plugin, Step, retain_with_reasons};
use crate::state::PluginState;

/// Keep only servers not reserved by an operator.
pub struct Reserved;

impl Plugin for Reserved {
    fn name(&self) -> &'static str {
        "hard-filter-reserved"
    }

    fn description(&self) -> &'static str {
        "Remove servers reserved by operators"
    }

    fn affects_capacity(&self) -> bool {
        true
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        _constraints: &Constraints,
    ) -> EngineResult<Step> {
        Ok(retain_with_reasons(servers, |server| {
            server.reserved.then(|| "Server is reserved".to_string())
        }))
    }
}

/// Keep only servers that finished setup.
pub struct Setup;

impl Plugin for Setup {
    fn name(&self) -> &'static str {
        "hard-filter-setup"
    }

    fn description(&self) -> &'static str {
        "Remove servers that are not set up"
    }

    fn affects_capacity(&self) -> bool {
        true
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        _constraints: &Constraints,
    ) -> EngineResult<Step> {
        Ok(retain_with_reasons(servers, |server| {
            (!server.setup).then(|| "Server is not set up".to_string())
        }))
    }
}

/// Keep only servers reporting status `running`.
pub struct Running;

impl Plugin for Running {
    fn name(&self) -> &'static str {
        "hard-filter-running"
    }

    fn description(&self) -> &'static str {
        "Remove servers that are not running"
    }

    fn affects_capacity(&self) -> bool {
        true
    }

    fn run(
        &self,
        _state: &mut PluginState,
        servers: Vec<Server>,
        _constraints: &Constraints,
    ) -> EngineResult<Step> {
        Ok(retain_with_reasons(servers, |server| {
            (server.status != ServerStatus::Running)
                .then(|| format!("Server status is {:?}, not running", server.status))
        }))
    }
}

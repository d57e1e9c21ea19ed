//! Subcommand implementations and the input files they share.

pub mod allocate;
pub mod capacity;
pub mod init;
pub mod plugins;

use std::path::Path;

use anyhow::Context;
use clap::Args;
use hostalloc_core::{Constraints, EngineConfig, Package, Server, Ticket, VmRequest};
use serde::Deserialize;
use tracing::info;

/// File arguments common to allocate and capacity.
#[derive(Args, Debug, Clone)]
pub struct Inputs {
    /// Inventory snapshot: a JSON array of servers
    #[arg(short, long, default_value = "servers.json")]
    pub servers: String,
    /// The VM to place, with optional package and tickets
    #[arg(short, long, default_value = "request.json")]
    pub request: String,
    /// Engine configuration; the recommended chain when omitted
    #[arg(short, long)]
    pub config: Option<String>,
}

/// Contents of request.json.
#[derive(Debug, Deserialize)]
pub struct RequestFile {
    pub vm: VmRequest,
    #[serde(default)]
    pub package: Option<Package>,
    #[serde(default)]
    pub tickets: Vec<Ticket>,
    /// Request time override (epoch ms), for replaying a past decision.
    #[serde(default)]
    pub now_ms: Option<u64>,
}

impl Inputs {
    pub fn load(&self) -> anyhow::Result<(EngineConfig, Vec<Server>, Constraints)> {
        let config = load_config(self.config.as_deref())?;
        let servers = load_servers(Path::new(&self.servers))?;
        let request = load_request(Path::new(&self.request))?;
        let constraints = constraints(request, &config);
        info!(
            "Loaded {} servers, placing {} with {} plugins",
            servers.len(),
            constraints.vm.uuid,
            config.chain().len()
        );
        Ok((config, servers, constraints))
    }
}

pub fn load_config(path: Option<&str>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(Path::new(path))
            .with_context(|| format!("failed to load engine config {path}")),
        None => Ok(EngineConfig::recommended()),
    }
}

pub fn load_servers(path: &Path) -> anyhow::Result<Vec<Server>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid server list in {}", path.display()))
}

pub fn load_request(path: &Path) -> anyhow::Result<RequestFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid request in {}", path.display()))
}

/// Build request constraints, taking policy defaults from the config.
pub fn constraints(request: RequestFile, config: &EngineConfig) -> Constraints {
    let mut c = Constraints::new(request.vm);
    c.package = request.package;
    c.tickets = request.tickets;
    c.defaults = config.defaults.clone();
    if let Some(now_ms) = request.now_ms {
        c.now_ms = now_ms;
    }
    // One-shot runs have no later request to protect.
    c.track_allocation = false;
    c
}

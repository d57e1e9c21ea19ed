//! engine.toml configuration parser.
//!
//! ```toml
//! plugins = ["calculate-recent-vms", "hard-filter-min-ram", "sort-server-spread", "pick-weighted-random"]
//!
//! [defaults]
//! server_spread = "min-ram"
//!
//! [tuning]
//! weighted_pick_fraction = 0.05
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::Defaults;

/// Plugin used when the configuration names no plugins at all.
pub const FALLBACK_PLUGIN: &str = "pick-random";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EngineConfig {
    /// Ordered plugin chain.
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub tuning: Tuning,
}

/// Numeric knobs for the built-in plugins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Tuning {
    /// How long a VM placed by this process is assumed invisible to the feed.
    pub recent_vm_window_secs: u64,
    /// How long a server stays "hot" after an allocation.
    pub recent_server_window_ms: u64,
    /// Upper bound on the share of candidates dropped for being hot.
    pub recent_server_max_fraction: f64,
    /// Share of servers (by free RAM) reserved for large requests.
    pub large_server_fraction: f64,
    /// Requests above this many MiB count as large.
    pub large_request_threshold_mib: u64,
    /// Share of the ordered list the weighted picker draws from.
    pub weighted_pick_fraction: f64,
    /// Share of servers kept by the owner-zone minimizer.
    pub owner_zone_fraction: f64,
    /// Maximum VMs per server.
    pub vm_count_limit: usize,
    /// Look-back window of the sick-server check.
    pub sick_window_secs: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            recent_vm_window_secs: 10 * 60,
            recent_server_window_ms: 5_000,
            recent_server_max_fraction: 0.25,
            large_server_fraction: 0.15,
            large_request_threshold_mib: 32 * 1024 - 256,
            weighted_pick_fraction: 0.05,
            owner_zone_fraction: 0.25,
            vm_count_limit: 224,
            sick_window_secs: 24 * 60 * 60,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The plugin chain to resolve, falling back to a lone random pick.
    pub fn chain(&self) -> Vec<String> {
        if self.plugins.is_empty() {
            vec![FALLBACK_PLUGIN.to_string()]
        } else {
            self.plugins.clone()
        }
    }

    /// The chain a production deployment normally runs.
    pub fn recommended() -> Self {
        let plugins = [
            "calculate-recent-vms",
            "calculate-ticketed-vms",
            "hard-filter-setup",
            "hard-filter-running",
            "hard-filter-reserved",
            "hard-filter-vm-count",
            "hard-filter-vlans",
            "hard-filter-overprovision-ratios",
            "hard-filter-sick-servers",
            "hard-filter-owner-same-servers",
            "hard-filter-min-ram",
            "hard-filter-min-cpu",
            "hard-filter-min-disk",
            "soft-filter-large-servers",
            "soft-filter-recent-servers",
            "sort-server-spread",
            "pick-weighted-random",
        ];
        Self {
            plugins: plugins.iter().map(|p| p.to_string()).collect(),
            defaults: Defaults::default(),
            tuning: Tuning::default(),
        }
    }
}

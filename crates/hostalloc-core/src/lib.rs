//! hostalloc core — the data the placement engine consumes.
//!
//! Everything in here is plain data: inventory snapshots of servers and
//! their VMs, provisioning tickets, the request being placed, and the
//! engine configuration. The engine itself lives in `hostalloc-engine`.
//!
//! # Modules
//!
//! - **`types`** — Server, VM, NIC, ticket, package and request records
//! - **`legacy`** — Deserialization helpers for legacy feed encodings
//! - **`config`** — `engine.toml` parsing (plugin chain, defaults, tuning)

pub mod config;
pub mod legacy;
pub mod types;

pub use config::{EngineConfig, Tuning};
pub use types::*;

/// One mebibyte, the unit RAM and disk figures are reported in.
pub const MIB: u64 = 1024 * 1024;

/// Current Unix epoch in milliseconds.
pub fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

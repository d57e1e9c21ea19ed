//! hostalloc-engine — VM placement over an inventory snapshot.
//!
//! An `Allocator` runs an ordered chain of plugins over a list of candidate
//! servers and returns the chosen server plus a reason for every server it
//! excluded. Plugins keep private state across requests (recent placements,
//! hot servers), which is what lets simultaneous requests avoid stepping on
//! each other.
//!
//! # Architecture
//!
//! ```text
//! Allocator
//!   ├── chain: [Plugin] (resolved by name through the Registry)
//!   │     adapters → hard filters → soft filters → rankers → picker
//!   └── StateStore (one mutex-guarded slot per plugin name)
//! ```
//!
//! # Modules
//!
//! - **`capacity`** — Free RAM / CPU / disk of a server
//! - **`plugin`** — The `Plugin` trait and step helpers
//! - **`state`** — Per-plugin persistent state
//! - **`adapters`** — Phantom VMs for placements the feed hasn't caught up with
//! - **`filters`** — Hard filters
//! - **`shapers`** — Soft filters (large-server pool, owner spread, hot servers)
//! - **`rankers`** — Orderings, including 2-adic packing
//! - **`pickers`** — Final selection
//! - **`registry`** — Name → plugin
//! - **`pipeline`** — The orchestrator

pub mod adapters;
pub mod capacity;
pub mod error;
pub mod filters;
pub mod pickers;
pub mod pipeline;
pub mod plugin;
pub mod rankers;
pub mod registry;
pub mod shapers;
pub mod state;

pub use capacity::{Capacity, available_capacity};
pub use error::{EngineError, EngineResult};
pub use pipeline::{Allocation, Allocator, StepSummary};
pub use plugin::{Plugin, Reasons, Step};
pub use registry::Registry;
pub use state::{PluginState, StateStore};

//! Soft filters — reshape the candidate set for diversity and fairness.
//!
//! These don't disqualify a server on its merits; they steer placement
//! away from it for this request. Removed servers still get a reason.

pub mod large_servers;
pub mod owner_zones;
pub mod recent_servers;

pub use large_servers::LargeServers;
pub use owner_zones::OwnerManyZones;
pub use recent_servers::RecentServers;

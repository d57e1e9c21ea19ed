//! Hard filters — remove servers failing a mandatory constraint.
//!
//! Every removed server gets exactly one reason from the filter that
//! removed it. All filters keep the relative order of survivors.

pub mod nic_tags;
pub mod overprovision;
pub mod owner;
pub mod resources;
pub mod sick;
pub mod status;

pub use nic_tags::NicTags;
pub use overprovision::OverprovisionRatios;
pub use owner::{OwnerSameRacks, OwnerSameServers};
pub use resources::{MinCpu, MinDisk, MinRam, VmCount};
pub use sick::SickServers;
pub use status::{Reserved, Running, Setup};

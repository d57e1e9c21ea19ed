//! Temporal-consistency adapters.
//!
//! The inventory feed lags real allocations. These plugins splice phantom
//! VMs into the snapshot so later steps see capacity that is already
//! spoken for. A VM the feed already reports is never replaced.

pub mod recent_vms;
pub mod ticketed_vms;

pub use recent_vms::RecentVms;
pub use ticketed_vms::TicketedVms;

use hostalloc_core::{MIB, Server, Vm};

use crate::capacity::{VIRTUALIZED_QUOTA_OVERHEAD_MIB, volume_total_mib};

/// Add `vm` to `server` unless a VM with the same uuid is already there,
/// bumping the disk counters the way the feed would once it catches up.
///
/// Returns whether the VM was added.
pub(crate) fn splice_phantom(server: &mut Server, vm: Vm, disks_mib: &[u64]) -> bool {
    if server.vms.contains_key(&vm.uuid) {
        return false;
    }

    let disk = &mut server.disk;
    if vm.brand.is_virtualized() {
        disk.kvm_zvol_volsize_bytes += volume_total_mib(disks_mib) * MIB;
        if let Some(quota) = disk.kvm_quota_bytes.as_mut() {
            *quota += VIRTUALIZED_QUOTA_OVERHEAD_MIB * MIB;
        }
    } else {
        disk.zone_quota_bytes += vm.quota_mib * MIB;
    }

    server.vms.insert(vm.uuid.clone(), vm);
    true
}

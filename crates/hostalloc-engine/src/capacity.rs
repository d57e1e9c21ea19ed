//! Capacity model — what a server can still take.
//!
//! Free CPU, RAM and disk are never read from the feed; they are derived
//! from the server's totals minus every VM known to be on it, phantom VMs
//! included. Results are floored integers and may be negative when a
//! server is over-committed.

use hostalloc_core::{MIB, Server, Vm, VmRequest};
use serde::{Deserialize, Serialize};

/// RAM a virtualized VM consumes on top of its guest memory.
pub const VIRTUALIZED_RAM_OVERHEAD_MIB: u64 = 1024;

/// Zone quota every virtualized VM carries in addition to its volumes.
pub const VIRTUALIZED_QUOTA_OVERHEAD_MIB: u64 = 10 * 1024;

/// Volumes are allocated in whole units of this size.
pub const VOLUME_ALLOCATION_UNIT_MIB: u64 = 1024;

/// Free resources on a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    /// CPU in percent of one core.
    pub cpu: i64,
    pub ram_mib: i64,
    pub disk_mib: i64,
}

/// Compute all three free figures for a server.
pub fn available_capacity(server: &Server) -> Capacity {
    Capacity {
        cpu: available_cpu(server),
        ram_mib: available_ram_mib(server),
        disk_mib: available_disk_mib(server),
    }
}

/// Memory a VM takes from its host, device overhead included.
pub fn vm_ram_footprint_mib(vm: &Vm) -> u64 {
    if vm.brand.is_virtualized() {
        vm.max_physical_memory_mib + VIRTUALIZED_RAM_OVERHEAD_MIB
    } else {
        vm.max_physical_memory_mib
    }
}

/// Usable RAM after the host reservation, minus every VM's footprint.
pub fn available_ram_mib(server: &Server) -> i64 {
    let total_mib = server.memory_total_bytes as f64 / MIB as f64;
    let usable = total_mib * (1.0 - server.reservation_ratio);
    let used: u64 = server.vms.values().map(vm_ram_footprint_mib).sum();
    (usable - used as f64).floor() as i64
}

/// CPU left after capped VMs, scaled by the server's CPU overprovision ratio.
///
/// A single uncapped VM can use every core, so the server has no
/// boundable free CPU at all.
pub fn available_cpu(server: &Server) -> i64 {
    let mut used = 0.0;
    for vm in server.vms.values() {
        match vm.cpu_cap {
            Some(cap) => used += f64::from(cap) / cpu_ratio(server),
            None => return 0,
        }
    }
    (f64::from(server.cpu_cores) * 100.0 - used).floor() as i64
}

fn cpu_ratio(server: &Server) -> f64 {
    match server.overprovision_ratios.cpu {
        Some(r) if r > 0.0 => r,
        _ => 1.0,
    }
}

/// Pool size minus images, zone quotas and virtualized volumes.
///
/// Feeds that don't report the virtualized zone-quota counter get the
/// fixed per-VM quota overhead subtracted instead.
pub fn available_disk_mib(server: &Server) -> i64 {
    let disk = &server.disk;
    let virtualized_quota = match disk.kvm_quota_bytes {
        Some(bytes) => bytes,
        None => {
            let count = server.vms.values().filter(|vm| vm.brand.is_virtualized()).count() as u64;
            count * VIRTUALIZED_QUOTA_OVERHEAD_MIB * MIB
        }
    };
    let used = i128::from(disk.installed_images_used_bytes)
        + i128::from(disk.zone_quota_bytes)
        + i128::from(disk.kvm_zvol_volsize_bytes)
        + i128::from(virtualized_quota);
    let free = i128::from(disk.pool_size_bytes) - used;
    free.div_euclid(i128::from(MIB)) as i64
}

/// Sum of per-disk sizes rounded up to whole allocation units.
pub fn volume_total_mib(disks_mib: &[u64]) -> u64 {
    let total: u64 = disks_mib.iter().sum();
    total.div_ceil(VOLUME_ALLOCATION_UNIT_MIB) * VOLUME_ALLOCATION_UNIT_MIB
}

/// Disk a new VM takes once placed, charged the way the feed will report it.
pub fn disk_demand_mib(req: &VmRequest) -> u64 {
    if req.brand.is_virtualized() {
        volume_total_mib(&req.disks_mib) + VIRTUALIZED_QUOTA_OVERHEAD_MIB
    } else {
        req.quota_mib
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostalloc_core::{Brand, DiskUsage};

    const GIB: u64 = 1024 * MIB;

    fn make_server(mem_gib: u64) -> Server {
        Server::new("s1", 16, mem_gib * GIB)
    }

    #[test]
    fn ram_subtracts_reservation_and_vms() {
        let mut server = make_server(64)
            .with_vm(Vm::new("a", "o", 4096))
            .with_vm(Vm::new("b", "o", 2048));
        server.reservation_ratio = 0.15;

        // 65536 * 0.85 = 55705.6 → minus 6144 = 49561.6 → floor.
        assert_eq!(available_ram_mib(&server), 49_561);
    }

    #[test]
    fn virtualized_vms_carry_ram_overhead() {
        let mut vm = Vm::new("a", "o", 4096);
        vm.brand = Brand::Bhyve;
        let server = make_server(16).with_vm(vm);

        assert_eq!(available_ram_mib(&server), 16_384 - 4096 - 1024);
    }

    #[test]
    fn overcommitted_ram_goes_negative() {
        let server = make_server(1).with_vm(Vm::new("a", "o", 2048));
        assert_eq!(available_ram_mib(&server), -1024);
    }

    #[test]
    fn cpu_divides_caps_by_overprovision_ratio() {
        let mut a = Vm::new("a", "o", 1024);
        a.cpu_cap = Some(400);
        let mut b = Vm::new("b", "o", 1024);
        b.cpu_cap = Some(200);
        let mut server = make_server(16).with_vm(a).with_vm(b);

        assert_eq!(available_cpu(&server), 1600 - 600);

        server.overprovision_ratios.cpu = Some(4.0);
        assert_eq!(available_cpu(&server), 1600 - 150);
    }

    #[test]
    fn uncapped_vm_zeroes_cpu() {
        let mut vm = Vm::new("a", "o", 1024);
        vm.cpu_cap = None;
        let server = make_server(16).with_vm(vm).with_vm(Vm::new("b", "o", 1024));

        assert_eq!(available_cpu(&server), 0);
    }

    #[test]
    fn disk_subtracts_every_counter() {
        let mut server = make_server(16);
        server.disk = DiskUsage {
            pool_size_bytes: 1000 * GIB,
            installed_images_used_bytes: 10 * GIB,
            zone_quota_bytes: 100 * GIB,
            kvm_zvol_volsize_bytes: 200 * GIB,
            kvm_quota_bytes: Some(20 * GIB),
        };

        assert_eq!(available_disk_mib(&server), (1000 - 330) * 1024);
    }

    #[test]
    fn missing_virtualized_quota_counter_uses_per_vm_overhead() {
        let mut kvm = Vm::new("a", "o", 1024);
        kvm.brand = Brand::Kvm;
        let mut server = make_server(16).with_vm(kvm).with_vm(Vm::new("b", "o", 1024));
        server.disk = DiskUsage {
            pool_size_bytes: 100 * GIB,
            ..DiskUsage::default()
        };

        assert_eq!(available_disk_mib(&server), 90 * 1024);
    }

    #[test]
    fn disk_floors_toward_negative_infinity() {
        let mut server = make_server(16);
        server.disk.pool_size_bytes = MIB;
        server.disk.zone_quota_bytes = MIB + 1;

        assert_eq!(available_disk_mib(&server), -1);
    }

    #[test]
    fn volume_total_rounds_up_to_allocation_unit() {
        assert_eq!(volume_total_mib(&[]), 0);
        assert_eq!(volume_total_mib(&[1024]), 1024);
        assert_eq!(volume_total_mib(&[1000, 500]), 2048);
    }

    #[test]
    fn disk_demand_matches_phantom_charge() {
        let mut req = VmRequest::new("vm", "o", 1024);
        req.quota_mib = 10_240;
        req.disks_mib = vec![10_240, 100];
        assert_eq!(disk_demand_mib(&req), 10_240);

        // 10340 rounds up to 11 GiB of volumes, plus the fixed zone quota.
        req.brand = Brand::Kvm;
        assert_eq!(disk_demand_mib(&req), 11 * 1024 + 10 * 1024);
    }

    #[test]
    fn empty_server_has_full_capacity() {
        let mut server = make_server(32);
        server.disk.pool_size_bytes = 500 * GIB;

        let cap = available_capacity(&server);
        assert_eq!(
            cap,
            Capacity {
                cpu: 1600,
                ram_mib: 32 * 1024,
                disk_mib: 500 * 1024,
            }
        );
    }
}

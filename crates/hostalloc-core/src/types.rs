//! Domain types for the placement engine.
//!
//! These types describe an inventory snapshot (servers, the VMs on them,
//! their NICs), in-flight provisioning tickets, and the request being
//! placed. All inventory types are serializable to/from JSON; the request
//! layer is expected to have validated them already.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::epoch_millis;
use crate::legacy::flexible_bool;

/// Unique identifier for a physical server.
pub type ServerUuid = String;

/// Unique identifier for a VM.
pub type VmUuid = String;

/// Unique identifier for the entity owning VMs.
pub type OwnerUuid = String;

// ── Server ────────────────────────────────────────────────────────

/// A physical host as reported by the inventory feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Server {
    pub uuid: ServerUuid,
    #[serde(default)]
    pub hostname: String,
    /// Total physical CPU cores.
    pub cpu_cores: u32,
    /// Total physical memory in bytes.
    pub memory_total_bytes: u64,
    /// Fraction of memory held back for the host itself (0.0..1.0).
    #[serde(default)]
    pub reservation_ratio: f64,
    #[serde(default)]
    pub disk: DiskUsage,
    #[serde(default)]
    pub overprovision_ratios: OverprovisionRatios,
    /// Whether the server has completed setup.
    #[serde(default, deserialize_with = "flexible_bool")]
    pub setup: bool,
    /// Reserved servers are withheld from allocation by operators.
    #[serde(default, deserialize_with = "flexible_bool")]
    pub reserved: bool,
    #[serde(default)]
    pub status: ServerStatus,
    #[serde(default)]
    pub rack_identifier: Option<String>,
    /// NIC inventory. `None` means the feed carried no NIC information.
    #[serde(default)]
    pub nics: Option<Vec<Nic>>,
    /// VMs known to be on this server, keyed by VM uuid.
    #[serde(default)]
    pub vms: BTreeMap<VmUuid, Vm>,
}

impl Server {
    /// A set-up, running, unreserved server with no VMs and no NICs.
    pub fn new(uuid: impl Into<String>, cpu_cores: u32, memory_total_bytes: u64) -> Self {
        let uuid = uuid.into();
        Self {
            hostname: uuid.clone(),
            uuid,
            cpu_cores,
            memory_total_bytes,
            reservation_ratio: 0.0,
            disk: DiskUsage::default(),
            overprovision_ratios: OverprovisionRatios::default(),
            setup: true,
            reserved: false,
            status: ServerStatus::Running,
            rack_identifier: None,
            nics: Some(Vec::new()),
            vms: BTreeMap::new(),
        }
    }

    /// Add a VM to the server's VM map (builder style).
    pub fn with_vm(mut self, vm: Vm) -> Self {
        self.vms.insert(vm.uuid.clone(), vm);
        self
    }

    /// Number of VMs on this server owned by `owner`.
    pub fn owner_vm_count(&self, owner: &str) -> usize {
        self.vms.values().filter(|vm| vm.owner_uuid == owner).count()
    }

    /// Whether any VM on this server belongs to `owner`.
    pub fn hosts_owner(&self, owner: &str) -> bool {
        self.vms.values().any(|vm| vm.owner_uuid == owner)
    }
}

/// Operational status reported for a server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Running,
    Rebooting,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Raw disk counters from the inventory feed, all in bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DiskUsage {
    pub pool_size_bytes: u64,
    #[serde(default)]
    pub installed_images_used_bytes: u64,
    /// Sum of zone quotas for OS VMs.
    #[serde(default)]
    pub zone_quota_bytes: u64,
    /// Sum of volume sizes backing virtualized VMs.
    #[serde(default)]
    pub kvm_zvol_volsize_bytes: u64,
    /// Sum of zone quotas for virtualized VMs. Older feeds omit it.
    #[serde(default)]
    pub kvm_quota_bytes: Option<u64>,
}

/// Overprovision ratios per resource class. Absent means 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct OverprovisionRatios {
    #[serde(default)]
    pub cpu: Option<f64>,
    #[serde(default)]
    pub ram: Option<f64>,
    #[serde(default)]
    pub disk: Option<f64>,
}

// ── NICs ──────────────────────────────────────────────────────────

/// A network interface and the NIC tags it provides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Nic {
    pub name: String,
    #[serde(default)]
    pub kind: NicKind,
    pub link_up: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Nic {
    pub fn physical(name: &str, link_up: bool, tags: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind: NicKind::Physical,
            link_up,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn overlay(name: &str, link_up: bool, tags: &[&str]) -> Self {
        Self {
            kind: NicKind::Overlay,
            ..Self::physical(name, link_up, tags)
        }
    }

    pub fn provides(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NicKind {
    #[default]
    Physical,
    Overlay,
}

// ── VM ────────────────────────────────────────────────────────────

/// A workload record, either from the feed or synthesized by an adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vm {
    pub uuid: VmUuid,
    pub owner_uuid: OwnerUuid,
    pub max_physical_memory_mib: u64,
    /// CPU cap in percent of one core. `None` means uncapped.
    #[serde(default)]
    pub cpu_cap: Option<u32>,
    #[serde(default)]
    pub quota_mib: u64,
    #[serde(default)]
    pub brand: Brand,
    #[serde(default)]
    pub state: VmState,
    /// Unix epoch milliseconds of the last state change.
    #[serde(default)]
    pub last_modified_ms: u64,
    #[serde(default)]
    pub origin: VmOrigin,
}

impl Vm {
    /// A running, capped feed VM with no disk quota.
    pub fn new(uuid: impl Into<String>, owner_uuid: impl Into<String>, ram_mib: u64) -> Self {
        Self {
            uuid: uuid.into(),
            owner_uuid: owner_uuid.into(),
            max_physical_memory_mib: ram_mib,
            cpu_cap: Some(100),
            quota_mib: 0,
            brand: Brand::Joyent,
            state: VmState::Running,
            last_modified_ms: 0,
            origin: VmOrigin::Feed,
        }
    }
}

/// VM brand. Virtualized brands carry fixed RAM and disk overheads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Brand {
    #[default]
    Joyent,
    JoyentMinimal,
    Lx,
    Kvm,
    Bhyve,
}

impl Brand {
    pub fn is_virtualized(self) -> bool {
        matches!(self, Brand::Kvm | Brand::Bhyve)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VmState {
    Running,
    Stopped,
    Provisioning,
    Failed,
    Destroyed,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Where a VM record came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VmOrigin {
    /// The authoritative inventory feed.
    #[default]
    Feed,
    /// Placed by this process within the recent-allocation window.
    Recent,
    /// An open provisioning ticket.
    Ticket,
}

// ── Tickets ───────────────────────────────────────────────────────

/// An in-flight provisioning intent not yet visible in the feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: String,
    pub scope: String,
    pub action: String,
    pub status: TicketStatus,
    pub server_uuid: ServerUuid,
    /// Workload metadata. Missing or partial metadata makes the ticket opaque.
    #[serde(default)]
    pub vm: Option<TicketVm>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Queued,
    Active,
    Finished,
    Expired,
    #[serde(other)]
    Unknown,
}

/// Workload metadata attached to a provisioning ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TicketVm {
    #[serde(default)]
    pub vm_uuid: Option<VmUuid>,
    #[serde(default)]
    pub owner_uuid: Option<OwnerUuid>,
    #[serde(default)]
    pub ram_mib: Option<u64>,
    #[serde(default)]
    pub cpu_cap: Option<u32>,
    #[serde(default)]
    pub quota_mib: u64,
    #[serde(default)]
    pub brand: Brand,
    /// Per-disk sizes for virtualized VMs.
    #[serde(default)]
    pub disks_mib: Vec<u64>,
}

// ── Request ───────────────────────────────────────────────────────

/// Named ranking policy selected per request or per package.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ServerSpread {
    MinRam,
    MaxRam,
    Random,
    MinOwner,
    #[serde(rename = "2adic")]
    TwoAdic,
}

/// The billing package resolved for the request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Package {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub alloc_server_spread: Option<ServerSpread>,
}

/// The shape of the VM being placed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VmRequest {
    pub uuid: VmUuid,
    pub owner_uuid: OwnerUuid,
    pub ram_mib: u64,
    #[serde(default)]
    pub cpu_cap: Option<u32>,
    #[serde(default)]
    pub quota_mib: u64,
    #[serde(default)]
    pub brand: Brand,
    /// Per-disk sizes, only meaningful for virtualized brands.
    #[serde(default)]
    pub disks_mib: Vec<u64>,
    /// NIC-tag requirements as alternative groups: every group must be
    /// satisfied by at least one of its tags.
    #[serde(default)]
    pub nic_tag_requirements: Vec<Vec<String>>,
    #[serde(default)]
    pub overprovision_ratios: OverprovisionRatios,
}

impl VmRequest {
    pub fn new(uuid: impl Into<String>, owner_uuid: impl Into<String>, ram_mib: u64) -> Self {
        Self {
            uuid: uuid.into(),
            owner_uuid: owner_uuid.into(),
            ram_mib,
            cpu_cap: None,
            quota_mib: 0,
            brand: Brand::Joyent,
            disks_mib: Vec::new(),
            nic_tag_requirements: Vec::new(),
            overprovision_ratios: OverprovisionRatios::default(),
        }
    }
}

/// Default policy values from the engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Defaults {
    #[serde(default)]
    pub server_spread: Option<ServerSpread>,
    /// When false, the min-ram/min-cpu/min-disk filters pass everything.
    #[serde(default = "default_true")]
    pub filter_min_resources: bool,
    /// When false, the large-server pool is not carved out.
    #[serde(default = "default_true")]
    pub filter_large_servers: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            server_spread: None,
            filter_min_resources: true,
            filter_large_servers: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Request-scoped context handed to every plugin.
#[derive(Debug, Clone)]
pub struct Constraints {
    pub vm: VmRequest,
    pub package: Option<Package>,
    pub defaults: Defaults,
    pub tickets: Vec<Ticket>,
    /// Pure capacity simulation: no placement, no reasons.
    pub capacity_only: bool,
    /// When false, post-allocation bookkeeping is skipped.
    pub track_allocation: bool,
    /// Request time, Unix epoch milliseconds.
    pub now_ms: u64,
}

impl Constraints {
    pub fn new(vm: VmRequest) -> Self {
        Self {
            vm,
            package: None,
            defaults: Defaults::default(),
            tickets: Vec::new(),
            capacity_only: false,
            track_allocation: true,
            now_ms: epoch_millis(),
        }
    }

    /// Spread policy: package override, then default, then min-ram.
    pub fn server_spread(&self) -> ServerSpread {
        self.package
            .as_ref()
            .and_then(|p| p.alloc_server_spread)
            .or(self.defaults.server_spread)
            .unwrap_or(ServerSpread::MinRam)
    }
}

//! Hypervisor-side records as reported by the Xen Orchestra REST API.
//!
//! Only the fields the reconciliation reads are typed; everything else the
//! API returns is ignored on deserialization.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Accepts a JSON string or number and keeps it as a string.
fn de_opt_stringish<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    Halted,
    Paused,
    Running,
    Suspended,
    #[serde(other)]
    Unknown,
}

impl Default for PowerState {
    fn default() -> Self {
        PowerState::Unknown
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerState::Halted => write!(f, "Halted"),
            PowerState::Paused => write!(f, "Paused"),
            PowerState::Running => write!(f, "Running"),
            PowerState::Suspended => write!(f, "Suspended"),
            PowerState::Unknown => write!(f, "Unknown"),
        }
    }
}

// ── Host ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostCpus {
    #[serde(default, alias = "cpu_count")]
    pub cores: Option<u32>,
    #[serde(default, alias = "socket_count")]
    pub sockets: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostMemory {
    #[serde(default)]
    pub usage: u64,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    #[serde(default)]
    pub hostname: String,
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    #[serde(default)]
    pub bios_strings: BTreeMap<String, String>,
    #[serde(rename = "$pool", default)]
    pub pool: Option<String>,
    #[serde(default)]
    pub power_state: PowerState,
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "CPUs", alias = "cpus", default)]
    pub cpus: HostCpus,
    #[serde(default)]
    pub memory: HostMemory,
    #[serde(default)]
    pub address: Option<String>,
    /// Boot time, epoch seconds.
    #[serde(rename = "startTime", default)]
    pub start_time: Option<i64>,
    #[serde(rename = "rebootRequired", default)]
    pub reboot_required: bool,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "productBrand", default)]
    pub product_brand: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Host {
    pub fn serial(&self) -> Option<&str> {
        self.bios_value("system-serial-number")
    }

    pub fn product_name(&self) -> Option<&str> {
        self.bios_value("system-product-name")
    }

    /// Free-text OS descriptor fed to the OS pattern extractor, e.g. `XCP-ng 8.2.1`.
    pub fn os_descriptor(&self) -> String {
        format!("{} {}", self.product_brand, self.version).trim().to_string()
    }

    fn bios_value(&self, key: &str) -> Option<&str> {
        self.bios_strings
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

// ── Virtual machine ───────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmCpus {
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub max: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmMemory {
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsVersion {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub distro: Option<String>,
    #[serde(default, deserialize_with = "de_opt_stringish")]
    pub major: Option<String>,
    #[serde(default, deserialize_with = "de_opt_stringish")]
    pub minor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub id: String,
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    #[serde(rename = "affinityHost", default)]
    pub affinity_host: Option<String>,
    /// Host currently running the VM (pool id when halted).
    #[serde(rename = "$container", default)]
    pub container: Option<String>,
    #[serde(rename = "$pool", default)]
    pub pool: Option<String>,
    #[serde(default)]
    pub power_state: PowerState,
    #[serde(rename = "CPUs", default)]
    pub cpus: VmCpus,
    #[serde(default)]
    pub memory: VmMemory,
    /// Guest-reported addresses keyed like `0/ipv4/0`.
    #[serde(default)]
    pub addresses: BTreeMap<String, String>,
    #[serde(rename = "mainIpAddress", default)]
    pub main_ip_address: Option<String>,
    #[serde(default)]
    pub os_version: Option<OsVersion>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl VirtualMachine {
    pub fn memory_mb(&self) -> u64 {
        self.memory.size / 1024 / 1024
    }

    /// Host the VM is pinned to or running on.
    pub fn host_ref(&self) -> Option<&str> {
        self.affinity_host
            .as_deref()
            .or(self.container.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// `mainIpAddress`, else the first guest-reported IPv4 address.
    pub fn primary_ipv4(&self) -> Option<&str> {
        if let Some(ip) = self.main_ip_address.as_deref().filter(|s| !s.is_empty()) {
            return Some(ip);
        }
        self.addresses
            .iter()
            .find(|(key, _)| key.contains("/ipv4/"))
            .map(|(_, ip)| ip.as_str())
    }

    /// Free-text OS descriptor reported by the guest tools.
    pub fn os_descriptor(&self) -> Option<String> {
        let os = self.os_version.as_ref()?;
        if let Some(name) = os.name.as_deref().filter(|s| !s.is_empty()) {
            return Some(name.to_string());
        }
        let distro = os.distro.as_deref()?;
        Some(match (&os.major, &os.minor) {
            (Some(major), Some(minor)) => format!("{distro} {major}.{minor}"),
            (Some(major), None) => format!("{distro} {major}"),
            _ => distro.to_string(),
        })
    }
}

// ── Disks ─────────────────────────────────────────────────────

/// Attachment of a disk image (or CD drive) to a VM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualBlockDevice {
    pub id: String,
    #[serde(rename = "VM")]
    pub vm: String,
    #[serde(rename = "VDI", default)]
    pub vdi: Option<String>,
    /// Guest device label such as `xvda`.
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub is_cd_drive: bool,
    #[serde(default, deserialize_with = "de_opt_stringish")]
    pub position: Option<String>,
    #[serde(default)]
    pub bootable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualDiskImage {
    pub id: String,
    #[serde(default)]
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    /// Virtual size in bytes.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub uuid: Option<String>,
}

impl VirtualDiskImage {
    pub fn size_mb(&self) -> u64 {
        self.size / 1024 / 1024
    }
}

//! Creation payloads for the NetBox REST API.
//!
//! Every optional field is omitted from the serialized body when unknown so
//! the server applies its own defaults.

use serde::{Deserialize, Serialize};

use crate::entity::{Endpoint, ObjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Offline,
    Active,
    Planned,
    Staged,
    Failed,
    Inventory,
    Decommissioning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmStatus {
    Offline,
    Active,
    Planned,
    Staged,
    Failed,
    Decommissioning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpStatus {
    Active,
    Reserved,
    Deprecated,
    Dhcp,
    Slaac,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritableDevice {
    pub name: String,
    pub device_type: ObjectId,
    pub role: ObjectId,
    pub site: ObjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rack: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeviceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritableVirtualMachine {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VmStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcpus: Option<u32>,
    /// Memory in MB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    /// Total disk in MB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritableVirtualDisk {
    pub name: String,
    pub virtual_machine: ObjectId,
    /// Size in MB.
    pub size: u64,
    /// Holds the hypervisor disk image id used to correlate on later runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritableIpAddress {
    /// CIDR notation, e.g. `10.0.0.5/32`.
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vrf: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IpStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A typed creation request bound to the endpoint it is submitted to.
pub trait CreationPayload: Serialize + Send + Sync {
    const ENDPOINT: Endpoint;

    /// Human-readable label used in log lines.
    fn label(&self) -> &str;
}

impl CreationPayload for WritableDevice {
    const ENDPOINT: Endpoint = Endpoint::Device;

    fn label(&self) -> &str {
        &self.name
    }
}

impl CreationPayload for WritableVirtualMachine {
    const ENDPOINT: Endpoint = Endpoint::VirtualMachine;

    fn label(&self) -> &str {
        &self.name
    }
}

impl CreationPayload for WritableVirtualDisk {
    const ENDPOINT: Endpoint = Endpoint::VirtualDisk;

    fn label(&self) -> &str {
        &self.name
    }
}

impl CreationPayload for WritableIpAddress {
    const ENDPOINT: Endpoint = Endpoint::IpAddress;

    fn label(&self) -> &str {
        &self.address
    }
}

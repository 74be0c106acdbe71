use serde::{Deserialize, Serialize};

/// Numeric primary key assigned by the inventory service.
pub type ObjectId = u64;

/// REST endpoints of the inventory service that the sync touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Device,
    DeviceType,
    DeviceRole,
    Platform,
    Site,
    Location,
    Tenant,
    Cluster,
    VirtualMachine,
    VirtualDisk,
    IpAddress,
}

impl Endpoint {
    pub const ALL: [Endpoint; 11] = [
        Endpoint::Device,
        Endpoint::DeviceType,
        Endpoint::DeviceRole,
        Endpoint::Platform,
        Endpoint::Site,
        Endpoint::Location,
        Endpoint::Tenant,
        Endpoint::Cluster,
        Endpoint::VirtualMachine,
        Endpoint::VirtualDisk,
        Endpoint::IpAddress,
    ];

    /// Collection path relative to the service base URL, with trailing slash.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Device => "/api/dcim/devices/",
            Endpoint::DeviceType => "/api/dcim/device-types/",
            Endpoint::DeviceRole => "/api/dcim/device-roles/",
            Endpoint::Platform => "/api/dcim/platforms/",
            Endpoint::Site => "/api/dcim/sites/",
            Endpoint::Location => "/api/dcim/locations/",
            Endpoint::Tenant => "/api/tenancy/tenants/",
            Endpoint::Cluster => "/api/virtualization/clusters/",
            Endpoint::VirtualMachine => "/api/virtualization/virtual-machines/",
            Endpoint::VirtualDisk => "/api/virtualization/virtual-disks/",
            Endpoint::IpAddress => "/api/ipam/ip-addresses/",
        }
    }

    /// Path of a single object.
    pub fn item_path(&self, id: ObjectId) -> String {
        format!("{}{}/", self.path(), id)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Device => write!(f, "device"),
            Endpoint::DeviceType => write!(f, "device_type"),
            Endpoint::DeviceRole => write!(f, "device_role"),
            Endpoint::Platform => write!(f, "platform"),
            Endpoint::Site => write!(f, "site"),
            Endpoint::Location => write!(f, "location"),
            Endpoint::Tenant => write!(f, "tenant"),
            Endpoint::Cluster => write!(f, "cluster"),
            Endpoint::VirtualMachine => write!(f, "virtual_machine"),
            Endpoint::VirtualDisk => write!(f, "virtual_disk"),
            Endpoint::IpAddress => write!(f, "ip_address"),
        }
    }
}

impl std::str::FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Endpoint::ALL
            .iter()
            .copied()
            .find(|e| {
                let name = e.to_string();
                normalized == name || normalized == format!("{name}s") || normalized == format!("{name}es")
            })
            .ok_or_else(|| format!("unknown endpoint: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_end_with_slash() {
        for endpoint in Endpoint::ALL {
            assert!(endpoint.path().ends_with('/'), "{endpoint}");
        }
        assert_eq!(
            Endpoint::VirtualDisk.item_path(42),
            "/api/virtualization/virtual-disks/42/"
        );
    }

    #[test]
    fn parse_accepts_plural_and_dashes() {
        assert_eq!("devices".parse::<Endpoint>().unwrap(), Endpoint::Device);
        assert_eq!("ip-addresses".parse::<Endpoint>().unwrap(), Endpoint::IpAddress);
        assert_eq!("Virtual_Machine".parse::<Endpoint>().unwrap(), Endpoint::VirtualMachine);
        assert!("racks".parse::<Endpoint>().is_err());
    }
}

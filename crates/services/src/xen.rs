//! Xen Orchestra REST client.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use invsync_connector::{CollaboratorError, HypervisorSource};
use invsync_core::config::XenConfig;
use invsync_core::source::{Host, VirtualBlockDevice, VirtualDiskImage, VirtualMachine};

use crate::http::ApiClient;

const SERVICE: &str = "xen";

const HOST_FIELDS: &str = "id,hostname,name_label,name_description,bios_strings,$pool,power_state,enabled,CPUs,memory,address,startTime,rebootRequired,version,productBrand,tags";
const VM_FIELDS: &str = "id,name_label,name_description,affinityHost,$container,$pool,power_state,CPUs,memory,addresses,mainIpAddress,os_version,tags";
const VBD_FIELDS: &str = "id,VM,VDI,device,is_cd_drive,position,bootable";
const VDI_FIELDS: &str = "id,name_label,name_description,size,uuid";

pub struct XenClient {
    api: ApiClient,
}

impl XenClient {
    pub fn new(config: &XenConfig, timeout_secs: u64) -> Result<Self, CollaboratorError> {
        let mut headers = Vec::new();
        if let Some(token) = &config.api_token {
            headers.push(("authorization", format!("Token {token}")));
        }
        let api = ApiClient::new(SERVICE, &config.base_url, &headers, timeout_secs, config.verify_ssl)?;
        Ok(Self { api })
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, CollaboratorError> {
        let body = self.api.get(path, query).await?;
        decode(body)
    }

    /// One disk image by id.
    pub async fn disk_image(&self, vdi_id: &str) -> Result<VirtualDiskImage, CollaboratorError> {
        self.fetch(&format!("/vdis/{vdi_id}"), &[("fields", VDI_FIELDS)]).await
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, CollaboratorError> {
    serde_json::from_value(body).map_err(|e| CollaboratorError::Decode {
        service: SERVICE,
        message: e.to_string(),
    })
}

#[async_trait]
impl HypervisorSource for XenClient {
    async fn list_hosts(&self) -> Result<Vec<Host>, CollaboratorError> {
        let hosts: Vec<Host> = self.fetch("/hosts", &[("fields", HOST_FIELDS)]).await?;
        tracing::debug!(count = hosts.len(), "Fetched hosts");
        Ok(hosts)
    }

    async fn list_vms(&self) -> Result<Vec<VirtualMachine>, CollaboratorError> {
        let vms: Vec<VirtualMachine> = self.fetch("/vms", &[("fields", VM_FIELDS)]).await?;
        tracing::debug!(count = vms.len(), "Fetched VMs");
        Ok(vms)
    }

    async fn vm_devices(&self, vm_id: &str) -> Result<Vec<VirtualBlockDevice>, CollaboratorError> {
        let filter = format!("VM:{vm_id}");
        self.fetch("/vbds", &[("fields", VBD_FIELDS), ("filter", filter.as_str())]).await
    }

    async fn virtual_disks(&self, devices: &[VirtualBlockDevice]) -> Result<Vec<VirtualDiskImage>, CollaboratorError> {
        let mut images = Vec::new();
        for (vm_id, vdi_id) in attached_images(devices) {
            match self.disk_image(vdi_id).await {
                Ok(image) => images.push(image),
                // Empty CD drives reference images that no longer exist.
                Err(CollaboratorError::NotFound { .. }) => {
                    tracing::warn!(vm = vm_id, vdi = vdi_id, "Attached disk image not found, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(images)
    }
}

/// Distinct `(vm, image)` ids referenced by `devices`, in attachment order.
fn attached_images(devices: &[VirtualBlockDevice]) -> Vec<(&str, &str)> {
    let mut ids: Vec<(&str, &str)> = Vec::new();
    for device in devices {
        let Some(vdi) = device.vdi.as_deref().filter(|id| !id.is_empty()) else {
            continue;
        };
        if !ids.iter().any(|(_, seen)| *seen == vdi) {
            ids.push((device.vm.as_str(), vdi));
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attached_images_are_unique_and_ordered() {
        let devices: Vec<VirtualBlockDevice> = serde_json::from_value(json!([
            { "id": "b1", "VM": "vm", "VDI": "disk-2" },
            { "id": "b2", "VM": "vm", "VDI": null, "is_cd_drive": true },
            { "id": "b3", "VM": "vm", "VDI": "disk-1" },
            { "id": "b4", "VM": "vm", "VDI": "disk-2" }
        ]))
        .unwrap();
        let ids: Vec<&str> = attached_images(&devices).into_iter().map(|(_, vdi)| vdi).collect();
        assert_eq!(ids, ["disk-2", "disk-1"]);
        assert!(attached_images(&devices).iter().all(|(vm, _)| *vm == "vm"));
    }

    #[test]
    fn wrong_shape_is_a_decode_error() {
        let err = decode::<Vec<Host>>(json!({ "error": "nope" })).unwrap_err();
        assert!(matches!(err, CollaboratorError::Decode { service: "xen", .. }));
    }

    #[test]
    fn token_header_is_optional() {
        let config = XenConfig {
            base_url: "https://xo.example.com/rest/v0".into(),
            api_token: None,
            verify_ssl: true,
        };
        assert!(XenClient::new(&config, 20).is_ok());
    }
}

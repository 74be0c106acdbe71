use std::collections::HashMap;

use invsync_core::inventory::{VmStatus, WritableVirtualMachine};
use invsync_core::source::{Host, PowerState, VirtualMachine};

use super::{no_target, object_id, optional_id, Reconciler, SyncKind, SyncReport};
use crate::error::ReconcileError;
use crate::matcher::{disambiguate, existing_record, resolve_by_name, MatchDecision, Resolution};
use crate::os_pattern::extract_os_pattern;
use crate::query::{vm_creation_query, VmSeeds};
use crate::resolve::extract_ids;

impl Reconciler {
    /// Hypervisor VMs → inventory virtual machines, attached to the device of their host.
    pub async fn sync_vms(&self) -> Result<SyncReport, ReconcileError> {
        let mut report = SyncReport::new(SyncKind::Vms);
        let hosts = self.source.list_hosts().await?;
        let hosts_by_id: HashMap<&str, &Host> = hosts.iter().map(|h| (h.id.as_str(), h)).collect();
        let vms = self.source.list_vms().await?;
        tracing::info!(hosts = hosts.len(), vms = vms.len(), "Hypervisor returned VMs");

        let mut batch = Vec::new();
        for vm in &vms {
            let host = vm.host_ref().and_then(|id| hosts_by_id.get(id).copied());
            let decision = self.decide_vm(vm, host).await?;
            if let Some(payload) = report.tally(&vm.name_label, decision) {
                batch.push(payload);
            }
        }

        self.submit(&mut report, batch).await?;
        Ok(report)
    }

    async fn decide_vm(
        &self,
        vm: &VirtualMachine,
        host: Option<&Host>,
    ) -> Result<MatchDecision<WritableVirtualMachine>, ReconcileError> {
        let Some(host) = host else {
            return Ok(no_target(format!(
                "hosting host '{}' unknown to the hypervisor",
                vm.host_ref().unwrap_or("(none)")
            )));
        };
        let seeds = &self.profile.vms;
        let platform = vm
            .os_descriptor()
            .map(|d| extract_os_pattern(&d))
            .filter(|p| !p.is_empty());

        let request = vm_creation_query(&VmSeeds {
            device_name: Some(&host.name_label),
            device_asset_tag: host.serial(),
            platform: platform.as_deref(),
            cluster: Some(&host.name_label),
            tenant: seeds.tenant.as_deref(),
            role: seeds.role.as_deref(),
            existing_name: Some(&vm.name_label),
            existing_serial: Some(&vm.id),
        });
        let ids = extract_ids(&self.query.execute_query(&request).await?)?;

        let existing = existing_record(ids.virtual_machines("existing_vm"), &vm.name_label, Some(&vm.id), |r| {
            (r.name.as_str(), r.serial.as_deref())
        });
        if let Some(existing) = existing {
            return Ok(existing.into());
        }

        let device = match disambiguate(ids.devices("device"), &host.name_label, |d| d.name.as_str()) {
            Resolution::Resolved(device) => device,
            Resolution::NotFound => {
                return Ok(no_target(format!("device '{}' not found", host.name_label)));
            }
            Resolution::Ambiguous(n) => {
                return Ok(no_target(format!(
                    "device '{}' is ambiguous ({n} candidates)",
                    host.name_label
                )));
            }
        };
        let cluster = match resolve_by_name(ids.candidates("cluster"), &host.name_label) {
            Resolution::Resolved(id) => id,
            Resolution::NotFound => {
                return Ok(no_target(format!("cluster '{}' not found", host.name_label)));
            }
            Resolution::Ambiguous(n) => {
                return Ok(no_target(format!(
                    "cluster '{}' is ambiguous ({n} candidates)",
                    host.name_label
                )));
            }
        };

        Ok(MatchDecision::NeedsCreation(WritableVirtualMachine {
            name: vm.name_label.clone(),
            status: Some(match vm.power_state {
                PowerState::Running | PowerState::Paused => VmStatus::Active,
                _ => VmStatus::Offline,
            }),
            site: device.site.as_deref().map(|id| object_id("site", id)).transpose()?,
            cluster: Some(object_id("cluster", &cluster)?),
            device: Some(object_id("device", &device.id)?),
            serial: Some(vm.id.clone()),
            role: optional_id(&ids, "role", seeds.role.as_deref())?,
            tenant: optional_id(&ids, "tenant", seeds.tenant.as_deref())?,
            platform: optional_id(&ids, "platform", platform.as_deref())?,
            vcpus: Some(vm.cpus.number).filter(|n| *n > 0),
            memory: Some(vm.memory_mb()).filter(|m| *m > 0),
            disk: None,
            description: Some(vm.name_description.clone()).filter(|d| !d.is_empty()),
        }))
    }
}

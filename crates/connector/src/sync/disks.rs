use invsync_core::inventory::WritableVirtualDisk;
use invsync_core::source::{VirtualBlockDevice, VirtualDiskImage, VirtualMachine};

use super::{no_target, object_id, Reconciler, SyncKind, SyncReport};
use crate::error::ReconcileError;
use crate::matcher::{disambiguate, match_disk, MatchDecision, ObservedDisk, Resolution};
use crate::query::vdisk_query;
use crate::resolve::extract_ids;

impl Reconciler {
    /// Hypervisor disk images → inventory virtual disks of already-synced VMs.
    pub async fn sync_disks(&self) -> Result<SyncReport, ReconcileError> {
        let mut report = SyncReport::new(SyncKind::Disks);
        let vms = self.source.list_vms().await?;
        tracing::info!(count = vms.len(), "Hypervisor returned VMs");

        let mut batch = Vec::new();
        for vm in &vms {
            self.collect_vm_disks(vm, &mut report, &mut batch).await?;
        }

        self.submit(&mut report, batch).await?;
        Ok(report)
    }

    async fn collect_vm_disks(
        &self,
        vm: &VirtualMachine,
        report: &mut SyncReport,
        batch: &mut Vec<WritableVirtualDisk>,
    ) -> Result<(), ReconcileError> {
        let devices = self.source.vm_devices(&vm.id).await?;
        if devices.is_empty() {
            tracing::debug!(vm = %vm.name_label, "No block devices, nothing to sync");
            return Ok(());
        }
        let images = self.source.virtual_disks(&devices).await?;

        let request = vdisk_query(&vm.name_label, Some(&vm.id));
        let ids = extract_ids(&self.query.execute_query(&request).await?)?;
        let target = match disambiguate(ids.virtual_machines("virtual_machine"), &vm.name_label, |r| r.name.as_str()) {
            Resolution::Resolved(target) => target,
            Resolution::NotFound => {
                report.tally::<WritableVirtualDisk>(
                    &vm.name_label,
                    no_target(format!("VM '{}' not found in NetBox", vm.name_label)),
                );
                return Ok(());
            }
            Resolution::Ambiguous(n) => {
                report.tally::<WritableVirtualDisk>(
                    &vm.name_label,
                    no_target(format!("VM '{}' is ambiguous in NetBox ({n} candidates)", vm.name_label)),
                );
                return Ok(());
            }
        };
        let vm_id = object_id("virtual_machine", &target.id)?;

        for device in &devices {
            let image = device
                .vdi
                .as_deref()
                .and_then(|id| images.iter().find(|image| image.id == id));
            let label = format!("{}/{}", vm.name_label, disk_label(device, image));
            let decision = match (device.is_cd_drive, image) {
                (false, None) => MatchDecision::Excluded("no disk image attached".to_string()),
                (is_cd_drive, image) => {
                    let observed = observe(device, image, is_cd_drive);
                    match_disk(&target.virtual_disks, &observed, vm_id)
                }
            };
            if let Some(payload) = report.tally(&label, decision) {
                batch.push(payload);
            }
        }
        Ok(())
    }
}

fn disk_label(device: &VirtualBlockDevice, image: Option<&VirtualDiskImage>) -> String {
    match image {
        Some(image) if !image.name_label.is_empty() => image.name_label.clone(),
        _ => device.device.clone().unwrap_or_else(|| device.id.clone()),
    }
}

fn observe(device: &VirtualBlockDevice, image: Option<&VirtualDiskImage>, is_cd_drive: bool) -> ObservedDisk {
    ObservedDisk {
        name: disk_label(device, image),
        external_id: image.map(|i| i.id.clone()).unwrap_or_default(),
        size_mb: image.map(VirtualDiskImage::size_mb).unwrap_or_default(),
        is_cd_drive,
    }
}

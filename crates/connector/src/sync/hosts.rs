use invsync_core::inventory::{DeviceStatus, WritableDevice};
use invsync_core::source::Host;

use super::{no_target, object_id, optional_id, Reconciler, SyncKind, SyncReport};
use crate::error::ReconcileError;
use crate::matcher::{disambiguate, existing_record, resolve_by_name, MatchDecision, Resolution};
use crate::os_pattern::extract_os_pattern;
use crate::query::{device_creation_query, DeviceSeeds};
use crate::resolve::extract_ids;

impl Reconciler {
    /// Hypervisor hosts → inventory devices.
    pub async fn sync_hosts(&self) -> Result<SyncReport, ReconcileError> {
        let mut report = SyncReport::new(SyncKind::Hosts);
        let hosts = self.source.list_hosts().await?;
        tracing::info!(count = hosts.len(), "Hypervisor returned hosts");

        let mut batch = Vec::new();
        for host in &hosts {
            let decision = self.decide_host(host).await?;
            if let Some(payload) = report.tally(&host.name_label, decision) {
                batch.push(payload);
            }
        }

        self.submit(&mut report, batch).await?;
        Ok(report)
    }

    async fn decide_host(&self, host: &Host) -> Result<MatchDecision<WritableDevice>, ReconcileError> {
        let seeds = &self.profile.hosts;
        let platform = extract_os_pattern(&host.os_descriptor());
        let platform = Some(platform.as_str()).filter(|p| !p.is_empty());

        let request = device_creation_query(&DeviceSeeds {
            device_type: host.product_name(),
            site: seeds.site.as_deref(),
            platform,
            cluster: Some(&host.name_label),
            tenant: seeds.tenant.as_deref(),
            role: seeds.role.as_deref(),
            existing_device: Some(&host.name_label),
        });
        let ids = extract_ids(&self.query.execute_query(&request).await?)?;

        let existing = existing_record(ids.devices("existing_device"), &host.name_label, host.serial(), |d| {
            (d.name.as_str(), d.serial.as_deref())
        });
        if let Some(existing) = existing {
            return Ok(existing.into());
        }

        let Some(device_type) = ids.first_id("deviceType") else {
            return Ok(no_target(format!(
                "device type '{}' not found",
                host.product_name().unwrap_or("(unknown)")
            )));
        };
        let Some(role) = ids.first_id("role") else {
            return Ok(no_target(format!("role '{}' not found", seeds.role.as_deref().unwrap_or(""))));
        };
        let wanted_site = seeds.site.as_deref().unwrap_or_default();
        let site = match disambiguate(ids.sites("site"), wanted_site, |s| s.name.as_str()) {
            Resolution::Resolved(site) => site,
            Resolution::NotFound => return Ok(no_target(format!("site '{wanted_site}' not found"))),
            Resolution::Ambiguous(n) => {
                return Ok(no_target(format!("site '{wanted_site}' is ambiguous ({n} candidates)")))
            }
        };

        let location = match seeds.location.as_deref() {
            Some(wanted) => {
                let found = site
                    .locations
                    .iter()
                    .find(|l| l.id == wanted || l.name.eq_ignore_ascii_case(wanted));
                if found.is_none() {
                    tracing::warn!(host = %host.name_label, location = wanted, site = %site.name, "Location not found in site");
                }
                found.map(|l| object_id("location", &l.id)).transpose()?
            }
            None => None,
        };

        let cluster = match resolve_by_name(ids.candidates("cluster"), &host.name_label) {
            Resolution::Resolved(id) => Some(object_id("cluster", &id)?),
            Resolution::NotFound => None,
            Resolution::Ambiguous(n) => {
                tracing::warn!(host = %host.name_label, candidates = n, "Cluster is ambiguous, leaving unset");
                None
            }
        };

        Ok(MatchDecision::NeedsCreation(WritableDevice {
            name: host.name_label.clone(),
            device_type: object_id("deviceType", device_type)?,
            role: object_id("role", role)?,
            site: object_id("site", &site.id)?,
            tenant: optional_id(&ids, "tenant", seeds.tenant.as_deref())?,
            platform: optional_id(&ids, "platform", platform)?,
            serial: host.serial().map(str::to_string),
            asset_tag: None,
            location,
            rack: None,
            status: Some(if host.enabled { DeviceStatus::Active } else { DeviceStatus::Offline }),
            cluster,
            description: Some(host.name_description.clone()).filter(|d| !d.is_empty()),
        }))
    }
}

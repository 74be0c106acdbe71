use std::collections::HashSet;
use std::net::Ipv4Addr;

use invsync_core::inventory::{IpStatus, WritableIpAddress};
use invsync_core::source::VirtualMachine;

use super::{optional_id, Reconciler, SyncKind, SyncReport};
use crate::error::ReconcileError;
use crate::matcher::{ip_exists, MatchDecision};
use crate::query::ip_address_query;
use crate::resolve::extract_ids;

impl Reconciler {
    /// Primary IPv4 address of each VM → inventory IP address.
    pub async fn sync_ips(&self) -> Result<SyncReport, ReconcileError> {
        let mut report = SyncReport::new(SyncKind::Ips);
        let vms = self.source.list_vms().await?;
        tracing::info!(count = vms.len(), "Hypervisor returned VMs");

        let mut queued: HashSet<String> = HashSet::new();
        let mut batch = Vec::new();
        for vm in &vms {
            let Some(ip) = vm.primary_ipv4() else {
                tracing::debug!(vm = %vm.name_label, "No reported address");
                continue;
            };
            let label = format!("{} ({ip})", vm.name_label);
            let decision = if queued.contains(ip) {
                MatchDecision::ExistsIdentical
            } else {
                self.decide_ip(vm, ip).await?
            };
            if let Some(payload) = report.tally(&label, decision) {
                queued.insert(ip.to_string());
                batch.push(payload);
            }
        }

        self.submit(&mut report, batch).await?;
        Ok(report)
    }

    async fn decide_ip(&self, vm: &VirtualMachine, ip: &str) -> Result<MatchDecision<WritableIpAddress>, ReconcileError> {
        if ip.parse::<Ipv4Addr>().is_err() {
            return Ok(MatchDecision::Excluded(format!("'{ip}' is not an IPv4 address")));
        }
        let seeds = &self.profile.ips;
        let request = ip_address_query(ip, seeds.tenant.as_deref());
        let ids = extract_ids(&self.query.execute_query(&request).await?)?;

        if ip_exists(ids.ip_addresses("ip_address"), ip) {
            return Ok(MatchDecision::ExistsIdentical);
        }

        Ok(MatchDecision::NeedsCreation(WritableIpAddress {
            address: format!("{ip}/{}", seeds.prefix_length),
            vrf: None,
            tenant: optional_id(&ids, "tenant", seeds.tenant.as_deref())?,
            status: Some(IpStatus::Active),
            dns_name: None,
            description: Some(vm.name_label.clone()),
        }))
    }
}

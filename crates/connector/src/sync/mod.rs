//! Orchestrators that push hypervisor records into the inventory.
//!
//! Every run is one serial pass: fetch source records, decide per record,
//! then submit all creations in a single batch. Any collaborator error aborts
//! the run before submission.

mod disks;
mod hosts;
mod ips;
mod vms;

use std::sync::Arc;

use serde::Serialize;

use invsync_core::inventory::CreationPayload;
use invsync_core::{ObjectId, SyncProfile};

use crate::error::ReconcileError;
use crate::matcher::{resolve_named_id, MatchDecision, Resolution};
use crate::resolve::NormalizedQueryResult;
use crate::traits::{HypervisorSource, InventoryMutation, InventoryQuery, Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Hosts,
    Vms,
    Disks,
    Ips,
}

impl SyncKind {
    /// Dependency order: devices before VMs before their disks and addresses.
    pub const ALL: [SyncKind; 4] = [SyncKind::Hosts, SyncKind::Vms, SyncKind::Disks, SyncKind::Ips];
}

impl std::fmt::Display for SyncKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncKind::Hosts => write!(f, "hosts"),
            SyncKind::Vms => write!(f, "vms"),
            SyncKind::Disks => write!(f, "disks"),
            SyncKind::Ips => write!(f, "ips"),
        }
    }
}

impl std::str::FromStr for SyncKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hosts" | "host" => Ok(SyncKind::Hosts),
            "vms" | "vm" => Ok(SyncKind::Vms),
            "disks" | "disk" | "vdisks" => Ok(SyncKind::Disks),
            "ips" | "ip" => Ok(SyncKind::Ips),
            other => Err(format!("unknown sync kind: {other}")),
        }
    }
}

/// Per-run decision counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub kind: SyncKind,
    pub examined: usize,
    pub identical: usize,
    pub conflicting: usize,
    pub not_found: usize,
    pub excluded: usize,
    pub queued: usize,
    pub created: usize,
}

impl SyncReport {
    pub fn new(kind: SyncKind) -> Self {
        Self {
            kind,
            examined: 0,
            identical: 0,
            conflicting: 0,
            not_found: 0,
            excluded: 0,
            queued: 0,
            created: 0,
        }
    }

    /// Count and log one decision; hand back the payload when it needs creating.
    pub(crate) fn tally<P>(&mut self, record: &str, decision: MatchDecision<P>) -> Option<P> {
        self.examined += 1;
        let kind = self.kind;
        match decision {
            MatchDecision::NoTargetFound(reason) => {
                self.not_found += 1;
                tracing::warn!(%kind, record, %reason, "Skipping '{record}': no target found");
                None
            }
            MatchDecision::ExistsIdentical => {
                self.identical += 1;
                tracing::info!(%kind, record, "Skipping '{record}': exists with matching data");
                None
            }
            MatchDecision::ExistsConflicting(detail) => {
                self.conflicting += 1;
                tracing::warn!(%kind, record, %detail, "Skipping '{record}': exists but differs ({detail})");
                None
            }
            MatchDecision::Excluded(reason) => {
                self.excluded += 1;
                tracing::debug!(%kind, record, %reason, "Excluded from sync");
                None
            }
            MatchDecision::NeedsCreation(payload) => {
                self.queued += 1;
                tracing::info!(%kind, record, "Queued '{record}' for creation");
                Some(payload)
            }
        }
    }
}

/// Runs the orchestrators against injected collaborators.
pub struct Reconciler {
    source: Arc<dyn HypervisorSource>,
    query: Arc<dyn InventoryQuery>,
    mutation: Arc<dyn InventoryMutation>,
    profile: SyncProfile,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn HypervisorSource>,
        query: Arc<dyn InventoryQuery>,
        mutation: Arc<dyn InventoryMutation>,
        profile: SyncProfile,
    ) -> Self {
        Self {
            source,
            query,
            mutation,
            profile,
        }
    }

    pub async fn run(&self, kind: SyncKind) -> Result<SyncReport, ReconcileError> {
        tracing::info!(%kind, "Starting sync");
        let result = match kind {
            SyncKind::Hosts => self.sync_hosts().await,
            SyncKind::Vms => self.sync_vms().await,
            SyncKind::Disks => self.sync_disks().await,
            SyncKind::Ips => self.sync_ips().await,
        };
        match &result {
            Ok(report) => tracing::info!(
                %kind,
                examined = report.examined,
                created = report.created,
                identical = report.identical,
                conflicting = report.conflicting,
                not_found = report.not_found,
                "Sync finished"
            ),
            Err(e) => tracing::error!(%kind, error = %e, "Sync aborted, nothing submitted"),
        }
        result
    }

    /// Run every kind in dependency order, stopping at the first failure.
    pub async fn run_all(&self) -> Result<Vec<SyncReport>, ReconcileError> {
        let mut reports = Vec::with_capacity(SyncKind::ALL.len());
        for kind in SyncKind::ALL {
            reports.push(self.run(kind).await?);
        }
        Ok(reports)
    }

    /// Submit the accumulated batch in one create call.
    async fn submit<P: CreationPayload>(&self, report: &mut SyncReport, batch: Vec<P>) -> Result<(), ReconcileError> {
        let endpoint = P::ENDPOINT;
        if batch.is_empty() {
            tracing::info!(%endpoint, "Nothing to create");
            return Ok(());
        }
        let labels: Vec<&str> = batch.iter().map(CreationPayload::label).collect();
        let body = batch
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(%endpoint, payload = ?body, "Submitting creation batch");

        let created = self.mutation.create(endpoint, Payload::Many(body)).await?;
        report.created = created.len();
        tracing::info!(%endpoint, created = report.created, records = ?labels, "Created {} {} record(s)", report.created, endpoint);
        Ok(())
    }
}

fn no_target<P>(what: impl Into<String>) -> MatchDecision<P> {
    MatchDecision::NoTargetFound(what.into())
}

/// Parse an inventory id for use in a payload.
fn object_id(alias: &str, id: &str) -> Result<ObjectId, ReconcileError> {
    id.parse()
        .map_err(|_| ReconcileError::MalformedResponse(format!("'{alias}' id '{id}' is not numeric")))
}

/// Optional foreign key from a plain id list: name match when several, else the first.
fn optional_id(ids: &NormalizedQueryResult, alias: &str, wanted: Option<&str>) -> Result<Option<ObjectId>, ReconcileError> {
    let list = ids.ids(alias);
    let chosen = match wanted {
        Some(name) => match resolve_named_id(list, ids.candidates(alias), name) {
            Resolution::Resolved(id) => Some(id),
            _ => list.first().cloned(),
        },
        None => list.first().cloned(),
    };
    chosen.map(|id| object_id(alias, &id)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::resolve::extract_ids;

    #[test]
    fn kind_parses_aliases() {
        assert_eq!("VMs".parse::<SyncKind>().unwrap(), SyncKind::Vms);
        assert_eq!("vdisks".parse::<SyncKind>().unwrap(), SyncKind::Disks);
        assert!("racks".parse::<SyncKind>().is_err());
        assert_eq!(SyncKind::Ips.to_string(), "ips");
    }

    #[test]
    fn tally_counts_each_outcome() {
        let mut report = SyncReport::new(SyncKind::Disks);
        assert_eq!(report.tally("a", MatchDecision::NeedsCreation(1)), Some(1));
        assert_eq!(report.tally::<i32>("b", MatchDecision::ExistsIdentical), None);
        assert_eq!(report.tally::<i32>("c", MatchDecision::ExistsConflicting("size".into())), None);
        assert_eq!(report.tally::<i32>("d", no_target("vm")), None);
        assert_eq!(report.tally::<i32>("e", MatchDecision::Excluded("cd".into())), None);
        assert_eq!(
            (report.examined, report.queued, report.identical, report.conflicting, report.not_found, report.excluded),
            (5, 1, 1, 1, 1, 1)
        );
    }

    #[test]
    fn optional_id_prefers_name_match() {
        let ids = extract_ids(&json!({
            "platform": [{ "id": "3", "name": "Debian 12" }, { "id": "12", "name": "Debian 12.5" }]
        }))
        .unwrap();
        assert_eq!(optional_id(&ids, "platform", Some("debian 12")).unwrap(), Some(3));
        assert_eq!(optional_id(&ids, "platform", Some("Debian")).unwrap(), Some(12));
        assert_eq!(optional_id(&ids, "tenant", None).unwrap(), None);
    }

    #[test]
    fn non_numeric_ids_are_malformed() {
        assert!(matches!(object_id("site", "abc"), Err(ReconcileError::MalformedResponse(_))));
        assert_eq!(object_id("site", "4").unwrap(), 4);
    }
}

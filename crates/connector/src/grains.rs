//! Salt minion version compliance against a target release.

use serde::Serialize;

use invsync_core::MinionGrains;

use crate::error::ReconcileError;
use crate::os_pattern::extract_os_pattern;
use crate::version::parse_version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VersionStatus {
    UpToDate,
    NeedsUpdate,
    HigherVersion,
    Unresponsive,
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionStatus::UpToDate => write!(f, "Up To Date"),
            VersionStatus::NeedsUpdate => write!(f, "Needs Update"),
            VersionStatus::HigherVersion => write!(f, "Higher Version"),
            VersionStatus::Unresponsive => write!(f, "Unresponsive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionEntry {
    pub minion_id: String,
    /// Raw `saltversion` grain; `None` when the minion did not answer.
    pub installed: Option<String>,
    pub os: Option<String>,
    pub status: VersionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionReport {
    pub target: String,
    pub entries: Vec<VersionEntry>,
}

impl VersionReport {
    pub fn count(&self, status: VersionStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub fn with_status(&self, status: VersionStatus) -> impl Iterator<Item = &VersionEntry> {
        self.entries.iter().filter(move |e| e.status == status)
    }
}

/// Classify each minion's Salt version against `target_version` (`major.minor`).
///
/// Versions compare as `(major, minor)` tuples. A minion without a
/// `saltversion` grain is unresponsive.
pub fn version_report(target_version: &str, minions: &[MinionGrains]) -> Result<VersionReport, ReconcileError> {
    let target = parse_version(target_version)?;

    let mut entries = Vec::with_capacity(minions.len());
    for minion in minions {
        let os = minion
            .grains
            .osfinger
            .as_deref()
            .map(extract_os_pattern)
            .filter(|os| !os.is_empty());
        let installed = minion.grains.saltversion.clone().filter(|v| !v.is_empty());

        let status = match installed.as_deref() {
            None => VersionStatus::Unresponsive,
            Some(raw) => {
                let version = parse_version(raw)?;
                match version.cmp(&target) {
                    std::cmp::Ordering::Less => VersionStatus::NeedsUpdate,
                    std::cmp::Ordering::Greater => VersionStatus::HigherVersion,
                    std::cmp::Ordering::Equal => VersionStatus::UpToDate,
                }
            }
        };
        tracing::debug!(minion = %minion.minion_id, installed = ?installed, %status, "Classified minion");

        entries.push(VersionEntry {
            minion_id: minion.minion_id.clone(),
            installed,
            os,
            status,
        });
    }

    let report = VersionReport {
        target: format!("{}.{}", target.0, target.1),
        entries,
    };
    tracing::info!(
        target = %report.target,
        needs_update = report.count(VersionStatus::NeedsUpdate),
        higher = report.count(VersionStatus::HigherVersion),
        unresponsive = report.count(VersionStatus::Unresponsive),
        up_to_date = report.count(VersionStatus::UpToDate),
        "Version report ready"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use invsync_core::Grains;

    fn minion(id: &str, version: Option<&str>, osfinger: Option<&str>) -> MinionGrains {
        MinionGrains {
            minion_id: id.into(),
            grains: Grains {
                saltversion: version.map(str::to_string),
                osfinger: osfinger.map(str::to_string),
                ..Default::default()
            },
        }
    }

    #[test]
    fn classifies_against_target() {
        let minions = [
            minion("old-major", Some("3005.1"), Some("Debian-11")),
            minion("old-minor", Some("3006.4"), None),
            minion("current", Some("3006.9"), Some("Ubuntu-22.04")),
            minion("newer-minor", Some("3006.10"), None),
            minion("newer-major", Some("3007.0"), None),
            minion("silent", None, None),
        ];
        let report = version_report("3006.9", &minions).unwrap();
        let statuses: Vec<VersionStatus> = report.entries.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                VersionStatus::NeedsUpdate,
                VersionStatus::NeedsUpdate,
                VersionStatus::UpToDate,
                VersionStatus::HigherVersion,
                VersionStatus::HigherVersion,
                VersionStatus::Unresponsive,
            ]
        );
        assert_eq!(report.target, "3006.9");
        assert_eq!(report.entries[0].os.as_deref(), Some("Debian 11"));
        assert_eq!(report.entries[2].os.as_deref(), Some("Ubuntu 22.04"));
        assert_eq!(report.count(VersionStatus::NeedsUpdate), 2);
    }

    #[test]
    fn lower_major_with_higher_minor_still_needs_update() {
        let report = version_report("3006.2", &[minion("m", Some("3005.9"), None)]).unwrap();
        assert_eq!(report.entries[0].status, VersionStatus::NeedsUpdate);
    }

    #[test]
    fn bad_versions_are_errors() {
        assert!(matches!(
            version_report("latest", &[]),
            Err(ReconcileError::InvalidVersionFormat(v)) if v == "latest"
        ));
        assert!(version_report("3006.9", &[minion("m", Some("nightly"), None)]).is_err());
    }

    #[test]
    fn status_labels_match_report_wording() {
        assert_eq!(VersionStatus::NeedsUpdate.to_string(), "Needs Update");
        assert_eq!(VersionStatus::HigherVersion.to_string(), "Higher Version");
        assert_eq!(VersionStatus::Unresponsive.to_string(), "Unresponsive");
    }
}

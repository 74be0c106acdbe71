//! Identity decisions: does the inventory already hold this record?

use std::collections::BTreeSet;

use invsync_core::inventory::WritableVirtualDisk;
use invsync_core::ObjectId;

use crate::resolve::{DiskRecord, IpRecord, NamedId};

/// Outcome of comparing one source record against the inventory.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchDecision<P> {
    /// A required related record (owning VM, device type, ...) could not be resolved.
    NoTargetFound(String),
    ExistsIdentical,
    /// Present but differing; never updated automatically.
    ExistsConflicting(String),
    NeedsCreation(P),
    /// Never synced (e.g. CD drives).
    Excluded(String),
}

/// Result of picking one record out of several candidates.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Resolved(T),
    NotFound,
    /// Several candidates and no unique exact-name winner.
    Ambiguous(usize),
}

impl<T> Resolution<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Resolution::Resolved(v) => Some(v),
            _ => None,
        }
    }
}

/// Ids of candidates whose name equals one of `names`, ignoring case. Sorted, unique.
pub fn match_names(candidates: &[NamedId], names: &[&str]) -> Vec<String> {
    let wanted: BTreeSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
    let mut matched = BTreeSet::new();
    for candidate in candidates {
        if wanted.contains(&candidate.name.to_lowercase()) {
            tracing::debug!(id = %candidate.id, name = %candidate.name, "Candidate matched by name");
            matched.insert(candidate.id.clone());
        }
    }
    matched.into_iter().collect()
}

/// Pick the one candidate for `wanted`.
///
/// A lone candidate is taken as-is. Among several, exactly one must carry
/// the wanted name (case-insensitive).
pub fn disambiguate<'a, T>(candidates: &'a [T], wanted: &str, name_of: impl Fn(&T) -> &str) -> Resolution<&'a T> {
    match candidates {
        [] => Resolution::NotFound,
        [only] => Resolution::Resolved(only),
        many => {
            let wanted = wanted.to_lowercase();
            let exact: Vec<&T> = many.iter().filter(|c| name_of(c).to_lowercase() == wanted).collect();
            match exact.as_slice() {
                [one] => Resolution::Resolved(*one),
                _ => Resolution::Ambiguous(many.len()),
            }
        }
    }
}

/// Resolve a plain id list (cluster, platform, ...) by name when it has several entries.
pub fn resolve_named_id(ids: &[String], candidates: &[NamedId], wanted: &str) -> Resolution<String> {
    match ids {
        [] => Resolution::NotFound,
        [only] => Resolution::Resolved(only.clone()),
        many => {
            let in_list: Vec<NamedId> = candidates.iter().filter(|c| many.contains(&c.id)).cloned().collect();
            match match_names(&in_list, &[wanted]).as_slice() {
                [one] => Resolution::Resolved(one.clone()),
                _ => Resolution::Ambiguous(many.len()),
            }
        }
    }
}

/// Resolve the record named `wanted` from every returned candidate.
///
/// A lone candidate is taken as-is. Among several, exactly one must carry the
/// wanted name, regardless of which candidates other lookups narrowed to.
pub fn resolve_by_name(candidates: &[NamedId], wanted: &str) -> Resolution<String> {
    let ids: BTreeSet<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
    match ids.len() {
        0 => Resolution::NotFound,
        1 => Resolution::Resolved(candidates[0].id.clone()),
        n => match match_names(candidates, &[wanted]).as_slice() {
            [one] => Resolution::Resolved(one.clone()),
            _ => Resolution::Ambiguous(n),
        },
    }
}

/// An inventory record already standing for the observed entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Existing {
    Identical,
    Conflicting(String),
}

impl<P> From<Existing> for MatchDecision<P> {
    fn from(existing: Existing) -> Self {
        match existing {
            Existing::Identical => MatchDecision::ExistsIdentical,
            Existing::Conflicting(detail) => MatchDecision::ExistsConflicting(detail),
        }
    }
}

/// Whether an existing record is the same entity as an observed one.
///
/// Name compares case-insensitively. Serials only count when both sides
/// have one. A match on just one of the two identifiers is a conflict.
pub fn identity_match(
    existing_name: &str,
    existing_serial: Option<&str>,
    name: &str,
    serial: Option<&str>,
) -> Option<Existing> {
    let name_eq = existing_name.to_lowercase() == name.to_lowercase();
    let serial_eq = match (existing_serial, serial) {
        (Some(a), Some(b)) => Some(a.to_lowercase() == b.to_lowercase()),
        _ => None,
    };
    match (name_eq, serial_eq) {
        (true, Some(true)) | (true, None) => Some(Existing::Identical),
        (true, Some(false)) => Some(Existing::Conflicting(format!(
            "name '{existing_name}' matches but serial '{}' differs from '{}'",
            existing_serial.unwrap_or_default(),
            serial.unwrap_or_default()
        ))),
        (false, Some(true)) => Some(Existing::Conflicting(format!(
            "serial '{}' matches but name '{existing_name}' differs from '{name}'",
            serial.unwrap_or_default()
        ))),
        (false, _) => None,
    }
}

/// First decisive [`identity_match`] across `existing`, preferring identical over conflicting.
pub fn existing_record<T>(
    existing: &[T],
    name: &str,
    serial: Option<&str>,
    identity_of: impl Fn(&T) -> (&str, Option<&str>),
) -> Option<Existing> {
    let mut conflict = None;
    for record in existing {
        let (existing_name, existing_serial) = identity_of(record);
        match identity_match(existing_name, existing_serial, name, serial) {
            Some(Existing::Identical) => return Some(Existing::Identical),
            Some(found) if conflict.is_none() => conflict = Some(found),
            _ => {}
        }
    }
    conflict
}

/// A disk attached to a VM on the hypervisor side.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedDisk {
    pub name: String,
    /// Hypervisor image id, stored in the inventory disk description.
    pub external_id: String,
    pub size_mb: u64,
    pub is_cd_drive: bool,
}

/// Decide what to do with one observed disk of inventory VM `vm_id`.
///
/// Existing disks match on name, and on external id when they have one.
/// Size drift is reported, never corrected.
pub fn match_disk(
    existing: &[DiskRecord],
    observed: &ObservedDisk,
    vm_id: ObjectId,
) -> MatchDecision<WritableVirtualDisk> {
    if observed.is_cd_drive {
        return MatchDecision::Excluded("CD drive".to_string());
    }

    let same = existing.iter().find(|disk| {
        disk.name == observed.name
            && (disk.description.is_empty() || disk.description == observed.external_id)
    });

    match same {
        Some(disk) if disk.size_mb == Some(observed.size_mb) => MatchDecision::ExistsIdentical,
        Some(disk) => MatchDecision::ExistsConflicting(format!(
            "size mismatch: inventory has {} MB, hypervisor reports {} MB",
            disk.size_mb.map(|s| s.to_string()).unwrap_or_else(|| "no size".to_string()),
            observed.size_mb
        )),
        None => MatchDecision::NeedsCreation(WritableVirtualDisk {
            name: observed.name.clone(),
            virtual_machine: vm_id,
            size: observed.size_mb,
            description: Some(observed.external_id.clone()).filter(|d| !d.is_empty()),
        }),
    }
}

/// Whether any existing address has exactly this host part.
pub fn ip_exists(existing: &[IpRecord], ip: &str) -> bool {
    existing
        .iter()
        .any(|record| record.address.split('/').next() == Some(ip))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(id: &str, name: &str) -> NamedId {
        NamedId {
            id: id.into(),
            name: name.into(),
        }
    }

    fn disk(name: &str, description: &str, size_mb: Option<u64>) -> DiskRecord {
        DiskRecord {
            id: "1".into(),
            name: name.into(),
            description: description.into(),
            size_mb,
        }
    }

    fn observed(name: &str, size_mb: u64) -> ObservedDisk {
        ObservedDisk {
            name: name.into(),
            external_id: "vd-1".into(),
            size_mb,
            is_cd_drive: false,
        }
    }

    #[test]
    fn names_match_case_insensitively() {
        let candidates = [named("100", "server-a"), named("200", "Server-B"), named("300", "Server-C")];
        assert_eq!(match_names(&candidates, &["Server-A", "Server-B"]), ["100", "200"]);
        assert!(match_names(&candidates, &["server"]).is_empty());
    }

    #[test]
    fn disambiguation_rules() {
        let candidates = [named("1", "xcp-ng-039"), named("2", "xcp-ng-0391")];
        let pick = |wanted| disambiguate(&candidates, wanted, |c| c.name.as_str()).ok().map(|c| c.id.clone());
        assert_eq!(pick("XCP-NG-039"), Some("1".to_string()));
        assert_eq!(disambiguate(&candidates, "xcp", |c| c.name.as_str()), Resolution::Ambiguous(2));
        assert_eq!(disambiguate(&candidates[..1], "anything", |c| c.name.as_str()), Resolution::Resolved(&candidates[0]));
        assert_eq!(disambiguate(&[] as &[NamedId], "x", |c| c.name.as_str()), Resolution::NotFound);
    }

    #[test]
    fn named_id_resolution() {
        let ids = vec!["1".to_string(), "2".to_string()];
        let candidates = [named("1", "Pool-A"), named("2", "pool-b"), named("3", "pool-a")];
        assert_eq!(resolve_named_id(&ids, &candidates, "POOL-B"), Resolution::Resolved("2".into()));
        assert_eq!(resolve_named_id(&ids, &candidates, "pool-c"), Resolution::Ambiguous(2));
        assert_eq!(resolve_named_id(&ids[..1], &candidates, "pool-c"), Resolution::Resolved("1".into()));
        assert_eq!(resolve_named_id(&[], &candidates, "pool-a"), Resolution::NotFound);
    }

    #[test]
    fn name_resolution_ignores_narrowed_lists() {
        let candidates = [named("7", "xcp-10"), named("8", "xcp-1-pool")];
        assert_eq!(resolve_by_name(&candidates, "xcp-1"), Resolution::Ambiguous(2));
        assert_eq!(resolve_by_name(&candidates, "XCP-10"), Resolution::Resolved("7".into()));
        assert_eq!(resolve_by_name(&candidates[1..], "xcp-1"), Resolution::Resolved("8".into()));
        let repeated = [named("7", "xcp-10"), named("7", "xcp-10")];
        assert_eq!(resolve_by_name(&repeated, "other"), Resolution::Resolved("7".into()));
        assert_eq!(resolve_by_name(&[], "xcp-1"), Resolution::NotFound);
    }

    #[test]
    fn identity_folds_non_ascii_case() {
        assert_eq!(identity_match("ÄRZTE-01", None, "ärzte-01", None), Some(Existing::Identical));
        assert_eq!(
            identity_match("srv", Some("ÉTÉ-1"), "srv", Some("été-1")),
            Some(Existing::Identical)
        );
    }

    #[test]
    fn identity_requires_both_when_available() {
        assert_eq!(identity_match("web01", Some("uuid-1"), "WEB01", Some("uuid-1")), Some(Existing::Identical));
        assert_eq!(identity_match("web01", None, "web01", Some("uuid-1")), Some(Existing::Identical));
        assert!(matches!(
            identity_match("web01", Some("uuid-2"), "web01", Some("uuid-1")),
            Some(Existing::Conflicting(_))
        ));
        assert!(matches!(
            identity_match("web01-old", Some("uuid-1"), "web01", Some("uuid-1")),
            Some(Existing::Conflicting(_))
        ));
        assert_eq!(identity_match("web011", Some("uuid-9"), "web01", Some("uuid-1")), None);
    }

    #[test]
    fn existing_record_prefers_identical() {
        let records = [("web01", Some("other")), ("web01", Some("uuid-1"))];
        let decision = existing_record(&records, "web01", Some("uuid-1"), |r| (r.0, r.1));
        assert_eq!(decision, Some(Existing::Identical));
        assert_eq!(existing_record(&records, "db01", None, |r| (r.0, r.1)), None);
    }

    #[test]
    fn disk_identical_when_sizes_agree() {
        let existing = [disk("Data", "", Some(50))];
        assert_eq!(match_disk(&existing, &observed("Data", 50), 999), MatchDecision::ExistsIdentical);
    }

    #[test]
    fn disk_conflict_on_size_drift() {
        let existing = [disk("Data", "vd-1", Some(50))];
        match match_disk(&existing, &observed("Data", 100), 999) {
            MatchDecision::ExistsConflicting(detail) => assert!(detail.contains("size mismatch"), "{detail}"),
            other => panic!("expected conflict, got {other:?}"),
        }
        let no_size = [disk("Data", "", None)];
        assert!(matches!(match_disk(&no_size, &observed("Data", 100), 999), MatchDecision::ExistsConflicting(_)));
    }

    #[test]
    fn disk_created_when_absent_or_correlated_elsewhere() {
        let expected = MatchDecision::NeedsCreation(WritableVirtualDisk {
            name: "Data".into(),
            virtual_machine: 999,
            size: 50,
            description: Some("vd-1".into()),
        });
        assert_eq!(match_disk(&[], &observed("Data", 50), 999), expected);
        let other_image = [disk("Data", "vd-7", Some(50))];
        assert_eq!(match_disk(&other_image, &observed("Data", 50), 999), expected);
    }

    #[test]
    fn cd_drives_are_always_excluded() {
        let mut cd = observed("Data", 50);
        cd.is_cd_drive = true;
        assert!(matches!(match_disk(&[], &cd, 1), MatchDecision::Excluded(_)));
        assert!(matches!(match_disk(&[disk("Data", "", Some(1))], &cd, 1), MatchDecision::Excluded(_)));
    }

    #[test]
    fn ip_match_is_exact_on_host_part() {
        let existing = [IpRecord {
            id: "1".into(),
            address: "10.0.0.50/24".into(),
        }];
        assert!(!ip_exists(&existing, "10.0.0.5"));
        assert!(ip_exists(&existing, "10.0.0.50"));
    }
}

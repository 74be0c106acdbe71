//! Turn a creation-id query response into per-alias identifiers and records.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::error::ReconcileError;
use crate::matcher::match_names;
use crate::normalize::id_string;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NamedId {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteRecord {
    pub id: String,
    pub name: String,
    pub locations: Vec<NamedId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    pub serial: Option<String>,
    pub site: Option<String>,
    pub location: Option<String>,
}

/// Virtual disk as stored in the inventory; `description` carries the hypervisor image id.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub size_mb: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VmRecord {
    pub id: String,
    pub name: String,
    pub serial: Option<String>,
    pub virtual_disks: Vec<DiskRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IpRecord {
    pub id: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Ids(Vec<String>),
    Sites(Vec<SiteRecord>),
    Devices(Vec<DeviceRecord>),
    VirtualMachines(Vec<VmRecord>),
    IpAddresses(Vec<IpRecord>),
}

/// Alias → resolved identifiers, deduplicated and sorted by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedQueryResult {
    entries: BTreeMap<String, Entry>,
    /// Candidate names for plain id lists, used for name disambiguation.
    names: BTreeMap<String, Vec<NamedId>>,
}

impl NormalizedQueryResult {
    /// Plain identifiers of `alias`; empty for record-shaped entries.
    pub fn ids(&self, alias: &str) -> &[String] {
        match self.entries.get(alias) {
            Some(Entry::Ids(ids)) => ids,
            _ => &[],
        }
    }

    /// Simple-list resolution: any element will do.
    pub fn first_id(&self, alias: &str) -> Option<&str> {
        self.ids(alias).first().map(String::as_str)
    }

    /// `(id, name)` candidates behind a plain id list.
    pub fn candidates(&self, alias: &str) -> &[NamedId] {
        self.names.get(alias).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn sites(&self, alias: &str) -> &[SiteRecord] {
        match self.entries.get(alias) {
            Some(Entry::Sites(records)) => records,
            _ => &[],
        }
    }

    pub fn devices(&self, alias: &str) -> &[DeviceRecord] {
        match self.entries.get(alias) {
            Some(Entry::Devices(records)) => records,
            _ => &[],
        }
    }

    pub fn virtual_machines(&self, alias: &str) -> &[VmRecord] {
        match self.entries.get(alias) {
            Some(Entry::VirtualMachines(records)) => records,
            _ => &[],
        }
    }

    pub fn ip_addresses(&self, alias: &str) -> &[IpRecord] {
        match self.entries.get(alias) {
            Some(Entry::IpAddresses(records)) => records,
            _ => &[],
        }
    }
}

/// Build a [`NormalizedQueryResult`] from a raw query response.
///
/// The `data` envelope is optional. Aliases with non-list values resolve to
/// nothing. When the response carries devices and the cluster list is not a
/// single element, clusters are narrowed to those whose name equals a device
/// name (case-insensitive), if any do.
pub fn extract_ids(response: &Value) -> Result<NormalizedQueryResult, ReconcileError> {
    let body = match response.get("data") {
        Some(data) => data,
        None => response,
    };
    let data = body.as_object().ok_or_else(|| {
        ReconcileError::MalformedResponse(format!("expected an object of aliases, got {}", kind(body)))
    })?;

    let mut result = NormalizedQueryResult::default();
    for (alias, value) in data {
        let items = match value.as_array() {
            Some(items) => items.as_slice(),
            None => &[],
        };
        let entry = match alias.as_str() {
            "site" => Entry::Sites(dedup_sorted(parse_each(alias, items, parse_site)?, |r| &r.id)),
            "device" | "existing_device" => {
                Entry::Devices(dedup_sorted(parse_each(alias, items, parse_device)?, |r| &r.id))
            }
            "virtual_machine" | "existing_vm" => {
                Entry::VirtualMachines(dedup_sorted(parse_each(alias, items, parse_vm)?, |r| &r.id))
            }
            "ip_address" => Entry::IpAddresses(dedup_sorted(parse_each(alias, items, parse_ip)?, |r| &r.id)),
            _ => {
                let named = parse_each(alias, items, parse_named)?;
                let ids: BTreeSet<String> = named.iter().map(|n| n.id.clone()).collect();
                result.names.insert(alias.clone(), named);
                Entry::Ids(ids.into_iter().collect())
            }
        };
        result.entries.insert(alias.clone(), entry);
    }

    apply_cluster_override(&mut result);
    Ok(result)
}

fn apply_cluster_override(result: &mut NormalizedQueryResult) {
    let device_names: Vec<&str> = result.devices("device").iter().map(|d| d.name.as_str()).collect();
    if device_names.is_empty() || result.ids("cluster").len() == 1 {
        return;
    }
    let matched = match_names(result.candidates("cluster"), &device_names);
    if !matched.is_empty() {
        tracing::info!(clusters = ?matched, "Narrowed clusters to device name matches");
        result.entries.insert("cluster".to_string(), Entry::Ids(matched));
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

fn parse_each<T>(
    alias: &str,
    items: &[Value],
    parse: fn(&Value) -> Option<T>,
) -> Result<Vec<T>, ReconcileError> {
    items
        .iter()
        .filter(|item| !item.is_null())
        .map(|item| {
            parse(item).ok_or_else(|| {
                ReconcileError::MalformedResponse(format!("'{alias}' entry without an id: {item}"))
            })
        })
        .collect()
}

fn dedup_sorted<T>(mut records: Vec<T>, key: fn(&T) -> &String) -> Vec<T> {
    records.sort_by(|a, b| key(a).cmp(key(b)));
    records.dedup_by(|a, b| key(a) == key(b));
    records
}

fn str_field(item: &Value, field: &str) -> Option<String> {
    item.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

fn nested_id(item: &Value, field: &str) -> Option<String> {
    item.get(field).and_then(|v| v.get("id")).and_then(id_string)
}

fn parse_named(item: &Value) -> Option<NamedId> {
    Some(NamedId {
        id: item.get("id").and_then(id_string)?,
        name: str_field(item, "name").unwrap_or_default(),
    })
}

fn parse_site(item: &Value) -> Option<SiteRecord> {
    let named = parse_named(item)?;
    let mut locations: Vec<NamedId> = item
        .get("locations")
        .and_then(Value::as_array)
        .map(|locs| locs.iter().filter_map(parse_named).collect())
        .unwrap_or_default();
    locations.sort();
    locations.dedup_by(|a, b| a.id == b.id);
    Some(SiteRecord {
        id: named.id,
        name: named.name,
        locations,
    })
}

fn parse_device(item: &Value) -> Option<DeviceRecord> {
    Some(DeviceRecord {
        id: item.get("id").and_then(id_string)?,
        name: str_field(item, "name").unwrap_or_default(),
        serial: str_field(item, "serial"),
        site: nested_id(item, "site"),
        location: nested_id(item, "location"),
    })
}

fn parse_disk(item: &Value) -> Option<DiskRecord> {
    let size_mb = match item.get("size") {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    Some(DiskRecord {
        id: item.get("id").and_then(id_string).unwrap_or_default(),
        name: str_field(item, "name").unwrap_or_default(),
        description: str_field(item, "description").unwrap_or_default(),
        size_mb,
    })
}

fn parse_vm(item: &Value) -> Option<VmRecord> {
    let virtual_disks = match item.get("virtualdisks") {
        Some(Value::Array(disks)) => disks.iter().filter_map(parse_disk).collect(),
        Some(disk @ Value::Object(_)) => parse_disk(disk).into_iter().collect(),
        _ => Vec::new(),
    };
    Some(VmRecord {
        id: item.get("id").and_then(id_string)?,
        name: str_field(item, "name").unwrap_or_default(),
        serial: str_field(item, "serial"),
        virtual_disks,
    })
}

fn parse_ip(item: &Value) -> Option<IpRecord> {
    Some(IpRecord {
        id: item.get("id").and_then(id_string)?,
        address: str_field(item, "address").unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_aliases_become_sorted_unique_ids() {
        let result = extract_ids(&json!({
            "data": {
                "deviceType": [{ "id": "22", "model": "R740" }, { "id": 3 }, { "id": "22" }],
                "tenant": null,
                "role": "unexpected"
            }
        }))
        .unwrap();
        assert_eq!(result.ids("deviceType"), ["22", "3"]);
        assert_eq!(result.first_id("deviceType"), Some("22"));
        assert!(result.ids("tenant").is_empty());
        assert!(result.ids("role").is_empty());
        assert!(result.ids("missing").is_empty());
    }

    #[test]
    fn site_keeps_locations() {
        let result = extract_ids(&json!({
            "site": [{
                "id": "4",
                "name": "HFM",
                "locations": [{ "id": "7", "name": "Room B" }, { "id": "1", "name": "Room A" }]
            }]
        }))
        .unwrap();
        let sites = result.sites("site");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].name, "HFM");
        let ids: Vec<&str> = sites[0].locations.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ["1", "7"]);
    }

    #[test]
    fn vm_disks_accept_a_single_object() {
        let result = extract_ids(&json!({
            "data": {
                "virtual_machine": [{
                    "id": 999,
                    "name": "MyServer",
                    "serial": "",
                    "virtualdisks": { "id": "5", "name": "Data", "size": 50, "description": "vd-1" }
                }]
            }
        }))
        .unwrap();
        let vms = result.virtual_machines("virtual_machine");
        assert_eq!(vms[0].id, "999");
        assert_eq!(vms[0].serial, None);
        assert_eq!(
            vms[0].virtual_disks,
            vec![DiskRecord {
                id: "5".into(),
                name: "Data".into(),
                description: "vd-1".into(),
                size_mb: Some(50),
            }]
        );
    }

    #[test]
    fn cluster_is_narrowed_by_device_names() {
        let result = extract_ids(&json!({
            "data": {
                "device": [
                    { "id": "1", "name": "Server-A", "site": { "id": "4" } },
                    { "id": "2", "name": "Server-B" }
                ],
                "cluster": [
                    { "id": "100", "name": "server-a" },
                    { "id": "200", "name": "Server-B" },
                    { "id": "300", "name": "Server-C" }
                ]
            }
        }))
        .unwrap();
        assert_eq!(result.ids("cluster"), ["100", "200"]);
        assert_eq!(result.devices("device")[0].site.as_deref(), Some("4"));
    }

    #[test]
    fn single_cluster_is_left_alone() {
        let result = extract_ids(&json!({
            "device": [{ "id": "1", "name": "host-a" }],
            "cluster": [{ "id": "9", "name": "something-else" }]
        }))
        .unwrap();
        assert_eq!(result.ids("cluster"), ["9"]);
    }

    #[test]
    fn unmatched_clusters_are_kept() {
        let result = extract_ids(&json!({
            "device": [{ "id": "1", "name": "host-a" }],
            "cluster": [{ "id": "9", "name": "x" }, { "id": "8", "name": "y" }]
        }))
        .unwrap();
        assert_eq!(result.ids("cluster"), ["8", "9"]);
    }

    #[test]
    fn records_without_ids_are_malformed() {
        let err = extract_ids(&json!({ "data": { "device": [{ "name": "no-id" }] } })).unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedResponse(_)));

        let err = extract_ids(&json!({ "data": null })).unwrap_err();
        assert!(err.to_string().contains("null"));
    }
}

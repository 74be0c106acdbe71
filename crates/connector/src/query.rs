//! GraphQL documents sent to the inventory service.
//!
//! Every operation is a set of aliased `*_list` sub-queries, each filtered by
//! its own `$variable`. Sub-queries whose seed value is absent are left out,
//! as are `OR` clauses with no value.

use serde::Serialize;
use serde_json::{json, Map, Value};

/// A rendered operation plus its variables, ready to POST to `/graphql/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQlRequest {
    #[serde(rename = "operationName")]
    pub operation: String,
    pub query: String,
    pub variables: Map<String, Value>,
}

/// A selected field, optionally with a nested selection.
#[derive(Debug, Clone)]
pub enum Field {
    Scalar(&'static str),
    Nested(&'static str, Vec<Field>),
}

fn id_name() -> Vec<Field> {
    vec![Field::Scalar("id"), Field::Scalar("name")]
}

fn nested_id_name(name: &'static str) -> Field {
    Field::Nested(name, id_name())
}

struct SubQuery {
    alias: &'static str,
    list_name: &'static str,
    variable: &'static str,
    filter_type: &'static str,
    fields: Vec<Field>,
}

pub struct QueryBuilder {
    operation: &'static str,
    sub_queries: Vec<SubQuery>,
    variables: Map<String, Value>,
}

impl QueryBuilder {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            sub_queries: Vec::new(),
            variables: Map::new(),
        }
    }

    /// Add `alias: list_name(filters: $variable) { fields }`. A `None` filter skips it.
    pub fn sub_query(
        mut self,
        alias: &'static str,
        list_name: &'static str,
        (variable, filter_type): (&'static str, &'static str),
        filter: Option<Value>,
        fields: Vec<Field>,
    ) -> Self {
        if let Some(filter) = filter {
            self.variables.insert(variable.to_string(), filter);
            self.sub_queries.push(SubQuery {
                alias,
                list_name,
                variable,
                filter_type,
                fields,
            });
        }
        self
    }

    pub fn build(self) -> GraphQlRequest {
        let mut query = format!("query {}", self.operation);
        if !self.sub_queries.is_empty() {
            query.push_str("(\n");
            for sq in &self.sub_queries {
                query.push_str(&format!("  ${}: {}!\n", sq.variable, sq.filter_type));
            }
            query.push(')');
        }
        query.push_str(" {\n");

        let rendered: Vec<String> = self
            .sub_queries
            .iter()
            .map(|sq| {
                let mut block = format!(
                    "  {}: {}(\n    filters: ${}\n  ) {{\n",
                    sq.alias, sq.list_name, sq.variable
                );
                render_fields(&sq.fields, 2, &mut block);
                block.push_str("  }");
                block
            })
            .collect();
        query.push_str(&rendered.join("\n\n"));
        query.push_str("\n}");

        GraphQlRequest {
            operation: self.operation.to_string(),
            query,
            variables: self.variables,
        }
    }
}

fn render_fields(fields: &[Field], depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for field in fields {
        match field {
            Field::Scalar(name) => {
                out.push_str(&indent);
                out.push_str(name);
                out.push('\n');
            }
            Field::Nested(name, children) => {
                out.push_str(&format!("{indent}{name} {{\n"));
                render_fields(children, depth + 1, out);
                out.push_str(&format!("{indent}}}\n"));
            }
        }
    }
}

// ── Filters ──────────────────────────────────────────────────

/// `{field: {i_contains: value}}`, or `None` when the value is absent or blank.
pub fn i_contains(field: &str, value: Option<&str>) -> Option<Value> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    Some(json!({ field: { "i_contains": value } }))
}

/// `{"OR": {clause, clause, ...}}` over the present clauses.
///
/// A single present clause is returned bare; no present clause yields `None`.
pub fn any_of(clauses: &[(&str, Option<&str>)]) -> Option<Value> {
    let mut merged = Map::new();
    for (field, value) in clauses {
        if let Some(Value::Object(clause)) = i_contains(field, *value) {
            merged.extend(clause);
        }
    }
    match merged.len() {
        0 => None,
        1 => Some(Value::Object(merged)),
        _ => Some(json!({ "OR": merged })),
    }
}

// ── Creation-id queries ──────────────────────────────────────

/// Seeds for resolving the foreign keys of a new device.
#[derive(Debug, Clone, Default)]
pub struct DeviceSeeds<'a> {
    pub device_type: Option<&'a str>,
    pub site: Option<&'a str>,
    pub platform: Option<&'a str>,
    pub cluster: Option<&'a str>,
    pub tenant: Option<&'a str>,
    pub role: Option<&'a str>,
    /// Name of the device whose prior existence should be checked.
    pub existing_device: Option<&'a str>,
}

pub fn device_creation_query(seeds: &DeviceSeeds<'_>) -> GraphQlRequest {
    QueryBuilder::new("GetDeviceCreationIDs")
        .sub_query(
            "deviceType",
            "device_type_list",
            ("deviceTypeFilter", "DeviceTypeFilter"),
            i_contains("model", seeds.device_type),
            vec![Field::Scalar("id"), Field::Scalar("model")],
        )
        .sub_query(
            "site",
            "site_list",
            ("siteFilter", "SiteFilter"),
            i_contains("name", seeds.site),
            vec![Field::Scalar("id"), Field::Scalar("name"), nested_id_name("locations")],
        )
        .sub_query(
            "platform",
            "platform_list",
            ("platformFilter", "PlatformFilter"),
            i_contains("name", seeds.platform),
            id_name(),
        )
        .sub_query(
            "cluster",
            "cluster_list",
            ("clusterFilter", "ClusterFilter"),
            i_contains("name", seeds.cluster),
            id_name(),
        )
        .sub_query(
            "tenant",
            "tenant_list",
            ("tenantFilter", "TenantFilter"),
            i_contains("name", seeds.tenant),
            id_name(),
        )
        .sub_query(
            "role",
            "device_role_list",
            ("deviceRoleFilter", "DeviceRoleFilter"),
            i_contains("name", seeds.role),
            id_name(),
        )
        .sub_query(
            "existing_device",
            "device_list",
            ("existingDeviceFilter", "DeviceFilter"),
            i_contains("name", seeds.existing_device),
            vec![
                Field::Scalar("id"),
                Field::Scalar("name"),
                Field::Scalar("serial"),
                nested_id_name("site"),
                nested_id_name("location"),
            ],
        )
        .build()
}

/// Seeds for resolving the foreign keys of a new virtual machine.
#[derive(Debug, Clone, Default)]
pub struct VmSeeds<'a> {
    /// Hosting device, matched by name or asset tag.
    pub device_name: Option<&'a str>,
    pub device_asset_tag: Option<&'a str>,
    pub platform: Option<&'a str>,
    pub cluster: Option<&'a str>,
    pub tenant: Option<&'a str>,
    pub role: Option<&'a str>,
    /// Existing VM to look for, matched by name or serial.
    pub existing_name: Option<&'a str>,
    pub existing_serial: Option<&'a str>,
}

pub fn vm_creation_query(seeds: &VmSeeds<'_>) -> GraphQlRequest {
    QueryBuilder::new("GetVMCreationIDs")
        .sub_query(
            "device",
            "device_list",
            ("deviceFilter", "DeviceFilter"),
            any_of(&[("name", seeds.device_name), ("asset_tag", seeds.device_asset_tag)]),
            vec![
                Field::Scalar("id"),
                Field::Scalar("name"),
                nested_id_name("site"),
                nested_id_name("location"),
            ],
        )
        .sub_query(
            "platform",
            "platform_list",
            ("platformFilter", "PlatformFilter"),
            i_contains("name", seeds.platform),
            id_name(),
        )
        .sub_query(
            "cluster",
            "cluster_list",
            ("clusterFilter", "ClusterFilter"),
            i_contains("name", seeds.cluster),
            id_name(),
        )
        .sub_query(
            "tenant",
            "tenant_list",
            ("tenantFilter", "TenantFilter"),
            i_contains("name", seeds.tenant),
            id_name(),
        )
        .sub_query(
            "role",
            "device_role_list",
            ("roleFilter", "DeviceRoleFilter"),
            i_contains("name", seeds.role),
            id_name(),
        )
        .sub_query(
            "existing_vm",
            "virtual_machine_list",
            ("existingVmFilter", "VirtualMachineFilter"),
            any_of(&[("name", seeds.existing_name), ("serial", seeds.existing_serial)]),
            vec![Field::Scalar("id"), Field::Scalar("name"), Field::Scalar("serial")],
        )
        .build()
}

/// Look up a VM and its current disks, by name or serial.
pub fn vdisk_query(vm_name: &str, serial: Option<&str>) -> GraphQlRequest {
    QueryBuilder::new("GetVirtualDiskCreationIDs")
        .sub_query(
            "virtual_machine",
            "virtual_machine_list",
            ("virtualMachineFilter", "VirtualMachineFilter"),
            any_of(&[("name", Some(vm_name)), ("serial", serial)]),
            vec![
                Field::Scalar("id"),
                Field::Scalar("name"),
                Field::Scalar("serial"),
                Field::Nested(
                    "virtualdisks",
                    vec![
                        Field::Scalar("id"),
                        Field::Scalar("name"),
                        Field::Scalar("size"),
                        Field::Scalar("description"),
                    ],
                ),
            ],
        )
        .build()
}

pub fn ip_address_query(address: &str, tenant: Option<&str>) -> GraphQlRequest {
    QueryBuilder::new("GetIPAddressCreationIDs")
        .sub_query(
            "ip_address",
            "ip_address_list",
            ("ipAddressFilter", "IPAddressFilter"),
            i_contains("address", Some(address)),
            vec![Field::Scalar("id"), Field::Scalar("address")],
        )
        .sub_query(
            "tenant",
            "tenant_list",
            ("tenantFilter", "TenantFilter"),
            i_contains("name", tenant),
            id_name(),
        )
        .build()
}

// ── Lookup queries ───────────────────────────────────────────

/// Full device tree for any device whose name, serial or asset tag contains `term`.
pub fn device_lookup_query(term: &str) -> GraphQlRequest {
    let term = Some(term);
    QueryBuilder::new("GetDeviceData")
        .sub_query(
            "device",
            "device_list",
            ("deviceFilter", "DeviceFilter"),
            any_of(&[("name", term), ("serial", term), ("asset_tag", term)]),
            vec![
                Field::Scalar("id"),
                Field::Scalar("name"),
                Field::Scalar("serial"),
                Field::Scalar("asset_tag"),
                Field::Scalar("status"),
                nested_id_name("role"),
                nested_id_name("tenant"),
                nested_id_name("platform"),
                Field::Nested(
                    "device_type",
                    vec![Field::Scalar("id"), Field::Scalar("model"), nested_id_name("manufacturer")],
                ),
                nested_id_name("site"),
                nested_id_name("location"),
                nested_id_name("rack"),
                Field::Scalar("position"),
                nested_id_name("cluster"),
                Field::Nested(
                    "virtual_machines",
                    vec![
                        Field::Scalar("id"),
                        Field::Scalar("name"),
                        nested_id_name("platform"),
                        Field::Nested(
                            "interfaces",
                            vec![
                                Field::Scalar("id"),
                                Field::Scalar("name"),
                                Field::Nested(
                                    "ip_addresses",
                                    vec![Field::Scalar("id"), Field::Scalar("address"), nested_id_name("vrf")],
                                ),
                            ],
                        ),
                        Field::Nested(
                            "virtualdisks",
                            vec![Field::Scalar("id"), Field::Scalar("name"), Field::Scalar("size")],
                        ),
                    ],
                ),
                nested_id_name("tags"),
                Field::Scalar("custom_fields"),
            ],
        )
        .build()
}

/// Full VM tree for any VM whose name or serial contains `term`.
pub fn vm_lookup_query(term: &str) -> GraphQlRequest {
    let term = Some(term);
    QueryBuilder::new("GetVirtualMachineData")
        .sub_query(
            "virtual_machine",
            "virtual_machine_list",
            ("virtualMachineFilter", "VirtualMachineFilter"),
            any_of(&[("name", term), ("serial", term)]),
            vec![
                Field::Scalar("id"),
                Field::Scalar("name"),
                Field::Scalar("serial"),
                Field::Scalar("status"),
                nested_id_name("site"),
                Field::Nested(
                    "cluster",
                    vec![Field::Scalar("id"), Field::Scalar("name"), nested_id_name("group")],
                ),
                nested_id_name("device"),
                nested_id_name("platform"),
                nested_id_name("role"),
                nested_id_name("tenant"),
                Field::Nested(
                    "interfaces",
                    vec![
                        Field::Scalar("id"),
                        Field::Scalar("name"),
                        Field::Nested("ip_addresses", vec![Field::Scalar("id"), Field::Scalar("address")]),
                    ],
                ),
                Field::Nested(
                    "virtualdisks",
                    vec![
                        Field::Scalar("id"),
                        Field::Scalar("name"),
                        Field::Scalar("size"),
                        Field::Scalar("description"),
                    ],
                ),
                nested_id_name("tags"),
                Field::Scalar("custom_fields"),
            ],
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_CREATION: &str = "query GetDeviceCreationIDs(\n  $deviceTypeFilter: DeviceTypeFilter!\n  $siteFilter: SiteFilter!\n  $platformFilter: PlatformFilter!\n  $clusterFilter: ClusterFilter!\n  $tenantFilter: TenantFilter!\n  $deviceRoleFilter: DeviceRoleFilter!\n) {\n  deviceType: device_type_list(\n    filters: $deviceTypeFilter\n  ) {\n    id\n    model\n  }\n\n  site: site_list(\n    filters: $siteFilter\n  ) {\n    id\n    name\n    locations {\n      id\n      name\n    }\n  }\n\n  platform: platform_list(\n    filters: $platformFilter\n  ) {\n    id\n    name\n  }\n\n  cluster: cluster_list(\n    filters: $clusterFilter\n  ) {\n    id\n    name\n  }\n\n  tenant: tenant_list(\n    filters: $tenantFilter\n  ) {\n    id\n    name\n  }\n\n  role: device_role_list(\n    filters: $deviceRoleFilter\n  ) {\n    id\n    name\n  }\n}";

    const VM_CREATION: &str = "query GetVMCreationIDs(\n  $deviceFilter: DeviceFilter!\n  $platformFilter: PlatformFilter!\n  $clusterFilter: ClusterFilter!\n) {\n  device: device_list(\n    filters: $deviceFilter\n  ) {\n    id\n    name\n    site {\n      id\n      name\n    }\n    location {\n      id\n      name\n    }\n  }\n\n  platform: platform_list(\n    filters: $platformFilter\n  ) {\n    id\n    name\n  }\n\n  cluster: cluster_list(\n    filters: $clusterFilter\n  ) {\n    id\n    name\n  }\n}";

    #[test]
    fn device_creation_document() {
        let req = device_creation_query(&DeviceSeeds {
            device_type: Some("r740"),
            site: Some("hfm"),
            platform: Some("12"),
            cluster: Some("1"),
            tenant: Some("infra"),
            role: Some("mt4"),
            existing_device: None,
        });
        assert_eq!(req.query, DEVICE_CREATION);
        assert_eq!(
            Value::Object(req.variables),
            json!({
                "deviceTypeFilter": { "model": { "i_contains": "r740" } },
                "siteFilter": { "name": { "i_contains": "hfm" } },
                "platformFilter": { "name": { "i_contains": "12" } },
                "clusterFilter": { "name": { "i_contains": "1" } },
                "tenantFilter": { "name": { "i_contains": "infra" } },
                "deviceRoleFilter": { "name": { "i_contains": "mt4" } },
            })
        );
    }

    #[test]
    fn vm_creation_document() {
        let req = vm_creation_query(&VmSeeds {
            device_name: Some("xcp-ng-039"),
            device_asset_tag: Some("947b9"),
            platform: Some("12"),
            cluster: Some("xcp-ng-039"),
            ..Default::default()
        });
        assert_eq!(req.query, VM_CREATION);
        assert_eq!(
            Value::Object(req.variables),
            json!({
                "deviceFilter": { "OR": {
                    "name": { "i_contains": "xcp-ng-039" },
                    "asset_tag": { "i_contains": "947b9" },
                } },
                "platformFilter": { "name": { "i_contains": "12" } },
                "clusterFilter": { "name": { "i_contains": "xcp-ng-039" } },
            })
        );
    }

    #[test]
    fn absent_seeds_drop_sub_queries() {
        let req = device_creation_query(&DeviceSeeds {
            device_type: Some("R740"),
            site: Some("  "),
            existing_device: Some("host01"),
            ..Default::default()
        });
        assert!(req.query.contains("deviceType: device_type_list"));
        assert!(req.query.contains("existing_device: device_list"));
        assert!(!req.query.contains("site_list"));
        assert!(!req.query.contains("$siteFilter"));
        assert_eq!(req.variables.len(), 2);
    }

    #[test]
    fn single_or_clause_is_sent_bare() {
        assert_eq!(
            any_of(&[("name", Some("web01")), ("serial", None)]),
            Some(json!({ "name": { "i_contains": "web01" } }))
        );
        assert_eq!(any_of(&[("name", None), ("serial", Some(""))]), None);
    }

    #[test]
    fn vdisk_document_selects_disk_fields() {
        let req = vdisk_query("web01", Some("abc-123"));
        assert!(req.query.starts_with(
            "query GetVirtualDiskCreationIDs(\n  $virtualMachineFilter: VirtualMachineFilter!\n) {\n"
        ));
        assert!(req.query.contains("    virtualdisks {\n      id\n      name\n      size\n      description\n    }\n"));
        assert_eq!(
            req.variables["virtualMachineFilter"],
            json!({ "OR": { "name": { "i_contains": "web01" }, "serial": { "i_contains": "abc-123" } } })
        );
    }

    #[test]
    fn request_serializes_for_graphql_endpoint() {
        let req = ip_address_query("10.0.0.5", None);
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["operationName"], "GetIPAddressCreationIDs");
        assert_eq!(body["variables"]["ipAddressFilter"]["address"]["i_contains"], "10.0.0.5");
        assert!(body["query"].as_str().unwrap().contains("ip_address: ip_address_list("));
    }

    #[test]
    fn lookup_documents_nest_selections() {
        let req = device_lookup_query("r740");
        assert!(req.query.contains("    device_type {\n      id\n      model\n      manufacturer {\n        id\n        name\n      }\n    }\n"));
        assert_eq!(req.variables["deviceFilter"]["OR"].as_object().unwrap().len(), 3);

        let req = vm_lookup_query("web01");
        assert!(req.query.contains("    cluster {\n      id\n      name\n      group {\n        id\n        name\n      }\n    }\n"));
    }
}

//! Per-deployment sync profile: query seeds and report settings loaded from YAML.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::formatter::Formatter;

fn default_prefix_length() -> u8 {
    32
}

fn default_target() -> String {
    "*".to_string()
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncProfile {
    #[serde(default)]
    pub hosts: HostSeeds,
    #[serde(default)]
    pub vms: VmSeeds,
    #[serde(default)]
    pub ips: IpSeeds,
    #[serde(default)]
    pub salt: SaltTarget,
    #[serde(default)]
    pub reports: ReportSettings,
    #[serde(default)]
    pub exports: ExportMaps,
}

/// Literal filter values used when resolving host → device foreign keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostSeeds {
    pub site: Option<String>,
    pub location: Option<String>,
    pub tenant: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmSeeds {
    pub tenant: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpSeeds {
    pub tenant: Option<String>,
    #[serde(default = "default_prefix_length")]
    pub prefix_length: u8,
}

impl Default for IpSeeds {
    fn default() -> Self {
        Self {
            tenant: None,
            prefix_length: default_prefix_length(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    Glob,
    Compound,
    List,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Glob => "glob",
            TargetType::Compound => "compound",
            TargetType::List => "list",
        }
    }
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "glob" => Ok(TargetType::Glob),
            "compound" => Ok(TargetType::Compound),
            "list" => Ok(TargetType::List),
            other => Err(format!("unknown target type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaltTarget {
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default)]
    pub target_type: TargetType,
}

impl Default for SaltTarget {
    fn default() -> Self {
        Self {
            target: default_target(),
            target_type: TargetType::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    #[serde(default = "default_reports_dir")]
    pub dir: PathBuf,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            dir: default_reports_dir(),
        }
    }
}

/// One CSV column: a dotted path into the serialized record plus an optional formatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportColumn {
    pub field: String,
    #[serde(default)]
    pub formatter: Option<Formatter>,
}

/// Column name → source mapping, in output order.
pub type ExportMap = IndexMap<String, ExportColumn>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportMaps {
    #[serde(default)]
    pub hosts: ExportMap,
    #[serde(default)]
    pub virtual_machines: ExportMap,
}

impl SyncProfile {
    pub fn from_yaml(yaml: &str) -> Result<Self, CoreError> {
        let profile: SyncProfile = serde_yaml::from_str(yaml).map_err(|e| {
            // Formatter keys are rejected inside serde; surface them as their own variant.
            match unknown_formatter(&e) {
                Some(key) => CoreError::UnknownFormatter(key),
                None => CoreError::Yaml(e),
            }
        })?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.ips.prefix_length == 0 || self.ips.prefix_length > 32 {
            return Err(CoreError::Config(format!(
                "ips.prefix_length must be within 1..=32, got {}",
                self.ips.prefix_length
            )));
        }
        for (column, export) in self.exports.hosts.iter().chain(self.exports.virtual_machines.iter()) {
            if export.field.trim().is_empty() {
                return Err(CoreError::Config(format!("export column '{column}' has an empty field path")));
            }
        }
        Ok(())
    }
}

fn unknown_formatter(e: &serde_yaml::Error) -> Option<String> {
    let msg = e.to_string();
    let start = msg.find("Unknown formatter '")? + "Unknown formatter '".len();
    let end = msg[start..].find('\'')?;
    Some(msg[start..start + end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
hosts:
  site: HQ
  tenant: infra
  role: hypervisor
vms:
  tenant: infra
ips:
  prefix_length: 24
salt:
  target: "web*"
reports:
  dir: /tmp/reports
exports:
  hosts:
    Name: { field: name_label }
    Serial: { field: bios_strings.system-serial-number, formatter: trim }
    Booted: { field: startTime, formatter: format_datetime }
"#;

    #[test]
    fn parses_sample_profile() {
        let profile = SyncProfile::from_yaml(SAMPLE).unwrap();
        assert_eq!(profile.hosts.site.as_deref(), Some("HQ"));
        assert_eq!(profile.hosts.location, None);
        assert_eq!(profile.ips.prefix_length, 24);
        assert_eq!(profile.salt.target, "web*");
        assert_eq!(profile.salt.target_type, TargetType::Glob);

        let columns: Vec<&str> = profile.exports.hosts.keys().map(String::as_str).collect();
        assert_eq!(columns, vec!["Name", "Serial", "Booted"]);
        assert_eq!(profile.exports.hosts["Booted"].formatter, Some(Formatter::FormatDatetime));
    }

    #[test]
    fn empty_document_yields_defaults() {
        let profile = SyncProfile::from_yaml("{}").unwrap();
        assert_eq!(profile, SyncProfile::default());
        assert_eq!(profile.ips.prefix_length, 32);
        assert_eq!(profile.salt.target, "*");
    }

    #[test]
    fn unknown_formatter_is_reported_by_key() {
        let yaml = "exports:\n  hosts:\n    Name: { field: name_label, formatter: lambda }\n";
        let err = SyncProfile::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, CoreError::UnknownFormatter(ref k) if k == "lambda"), "{err}");
    }

    #[test]
    fn rejects_out_of_range_prefix() {
        let err = SyncProfile::from_yaml("ips:\n  prefix_length: 40\n").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}

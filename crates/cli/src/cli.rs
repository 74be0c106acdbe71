use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use invsync_connector::SyncKind;
use invsync_core::profile::TargetType;
use invsync_core::{Endpoint, ObjectId};

/// Reconcile Xen Orchestra inventory into NetBox and audit Salt minion versions.
#[derive(Parser, Debug)]
#[command(name = "invsync", version)]
pub struct CliArgs {
    /// Sync profile YAML (default: ~/.config/invsync/profile.yaml)
    #[arg(long, global = true, env = "INVSYNC_PROFILE_FILE")]
    pub profile: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Push hypervisor records into NetBox
    Sync {
        #[arg(value_enum)]
        kind: SyncTarget,

        /// Only this Xen datacenter (default: every configured one)
        #[arg(long)]
        datacenter: Option<String>,
    },

    /// Compare Salt minion versions against the target release
    Grains {
        /// Salt target expression (overrides the profile)
        #[arg(long)]
        target: Option<String>,

        /// How the target is matched (overrides the profile)
        #[arg(long, value_enum)]
        target_type: Option<TargetTypeArg>,

        /// Baseline `major.minor` (overrides SALT_TARGET_VERSION)
        #[arg(long)]
        target_version: Option<String>,

        /// Also write the report to <reports_dir>/<target>_report.csv
        #[arg(long)]
        csv: bool,
    },

    /// Look up a NetBox record and print its normalized tree
    Lookup {
        #[arg(value_enum)]
        kind: LookupKind,
        term: String,
    },

    /// Write hypervisor records to CSV through the profile's export map
    Export {
        #[arg(value_enum)]
        kind: ExportKind,
        #[arg(long)]
        out: PathBuf,

        /// Only this Xen datacenter (default: every configured one)
        #[arg(long)]
        datacenter: Option<String>,
    },

    /// Direct record access against the NetBox REST API
    Inventory {
        #[command(subcommand)]
        action: InventoryAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum InventoryAction {
    List {
        endpoint: Endpoint,
        /// Query filter as key=value; repeatable
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
    Get {
        endpoint: Endpoint,
        id: ObjectId,
    },
    Delete {
        endpoint: Endpoint,
        #[arg(required = true)]
        ids: Vec<ObjectId>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncTarget {
    Hosts,
    Vms,
    Disks,
    Ips,
    All,
}

impl SyncTarget {
    pub fn kinds(self) -> Vec<SyncKind> {
        match self {
            SyncTarget::Hosts => vec![SyncKind::Hosts],
            SyncTarget::Vms => vec![SyncKind::Vms],
            SyncTarget::Disks => vec![SyncKind::Disks],
            SyncTarget::Ips => vec![SyncKind::Ips],
            SyncTarget::All => SyncKind::ALL.to_vec(),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetTypeArg {
    Glob,
    Compound,
    List,
}

impl From<TargetTypeArg> for TargetType {
    fn from(arg: TargetTypeArg) -> Self {
        match arg {
            TargetTypeArg::Glob => TargetType::Glob,
            TargetTypeArg::Compound => TargetType::Compound,
            TargetTypeArg::List => TargetType::List,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupKind {
    Device,
    Vm,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportKind {
    Hosts,
    Vms,
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_all_expands_in_dependency_order() {
        let args = CliArgs::try_parse_from(["invsync", "sync", "all"]).unwrap();
        match args.command {
            Command::Sync { kind, datacenter } => {
                assert_eq!(kind.kinds(), SyncKind::ALL.to_vec());
                assert_eq!(datacenter, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn grains_flags_parse() {
        let args = CliArgs::try_parse_from([
            "invsync",
            "--verbose",
            "grains",
            "--target",
            "web* and G@os:Debian",
            "--target-type",
            "compound",
            "--csv",
        ])
        .unwrap();
        assert!(args.verbose);
        match args.command {
            Command::Grains {
                target,
                target_type,
                csv,
                ..
            } => {
                assert_eq!(target.as_deref(), Some("web* and G@os:Debian"));
                assert_eq!(target_type.map(TargetType::from), Some(TargetType::Compound));
                assert!(csv);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn inventory_endpoints_and_filters_parse() {
        let args = CliArgs::try_parse_from([
            "invsync",
            "inventory",
            "list",
            "virtual-machines",
            "--filter",
            "site=hfm",
            "--filter",
            "status=active",
        ])
        .unwrap();
        match args.command {
            Command::Inventory {
                action: InventoryAction::List { endpoint, filters },
            } => {
                assert_eq!(endpoint, Endpoint::VirtualMachine);
                assert_eq!(filters[0], ("site".to_string(), "hfm".to_string()));
                assert_eq!(filters.len(), 2);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn export_can_target_one_datacenter() {
        let args =
            CliArgs::try_parse_from(["invsync", "export", "vms", "--out", "vms.csv", "--datacenter", "hfm"]).unwrap();
        match args.command {
            Command::Export { kind, out, datacenter } => {
                assert_eq!(kind, ExportKind::Vms);
                assert_eq!(out, PathBuf::from("vms.csv"));
                assert_eq!(datacenter.as_deref(), Some("hfm"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn delete_requires_ids() {
        assert!(CliArgs::try_parse_from(["invsync", "inventory", "delete", "devices"]).is_err());
        assert!(parse_filter("novalue").is_err());
    }
}

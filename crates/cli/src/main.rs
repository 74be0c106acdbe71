mod cli;
mod config;
mod report;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing::{error, info};

use invsync_connector::query::{device_lookup_query, vm_lookup_query};
use invsync_connector::{flatten_to_target, version_report, GrainsSource, HypervisorSource, InventoryQuery, Reconciler};
use invsync_core::config::XenConfig;
use invsync_core::{Config, SyncProfile};
use invsync_services::{NetBoxClient, SaltClient, XenClient};

use crate::cli::{CliArgs, Command, ExportKind, InventoryAction, LookupKind, SyncTarget};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    invsync_core::config::load_dotenv();
    let config = Config::from_env();
    config.log_summary();
    tracing::debug!(config = %config.redacted_summary(), "Effective configuration");

    match run(args, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = format!("{e:#}");
            error!(error = %message, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs, config: &Config) -> Result<()> {
    let profile = config::load_profile(args.profile.as_deref())?;

    match args.command {
        Command::Sync { kind, datacenter } => sync(config, profile, kind, datacenter.as_deref()).await,
        Command::Grains {
            target,
            target_type,
            target_version,
            csv,
        } => {
            let target = target.unwrap_or_else(|| profile.salt.target.clone());
            let target_type = target_type.map(Into::into).unwrap_or(profile.salt.target_type);
            let target_version = target_version.unwrap_or_else(|| config.salt.target_version.clone());

            if !config.salt.is_configured() {
                bail!("SALT_USERNAME and SALT_PASSWORD must be set");
            }
            let salt = SaltClient::new(&config.salt, config.http_timeout_secs)?;
            salt.login().await.context("Salt login failed")?;
            let minions = salt.minion_grains(&target, target_type).await?;
            info!(target = %target, %target_type, minions = minions.len(), "Salt returned grains");

            let report = version_report(&target_version, &minions)?;
            report::print_version_report(&report);
            if csv {
                let path = report::write_version_csv(&profile.reports.dir, &target, &report)?;
                println!("\nReport written to {}", path.display());
            }
            Ok(())
        }
        Command::Lookup { kind, term } => {
            let netbox = NetBoxClient::new(&config.netbox, config.http_timeout_secs)?;
            let request = match kind {
                LookupKind::Device => device_lookup_query(&term),
                LookupKind::Vm => vm_lookup_query(&term),
            };
            let response = netbox.execute_query(&request).await?;
            print_json(&flatten_to_target(&response, "id"))
        }
        Command::Export { kind, out, datacenter } => {
            let columns = match kind {
                ExportKind::Hosts => &profile.exports.hosts,
                ExportKind::Vms => &profile.exports.virtual_machines,
            };
            if columns.is_empty() {
                bail!("profile defines no export columns for {kind:?}");
            }
            let mut records = Vec::new();
            for (name, xen_config) in datacenters(config, datacenter.as_deref())? {
                let xen = XenClient::new(xen_config, config.http_timeout_secs)?;
                let fetched = match kind {
                    ExportKind::Hosts => to_values(&xen.list_hosts().await?)?,
                    ExportKind::Vms => to_values(&xen.list_vms().await?)?,
                };
                info!(datacenter = %name, records = fetched.len(), "Fetched records for export");
                records.extend(fetched);
            }
            let headers: Vec<&str> = columns.keys().map(String::as_str).collect();
            report::write_csv(&out, &headers, &report::export_rows(&records, columns))?;
            println!("Exported {} record(s) to {}", records.len(), out.display());
            Ok(())
        }
        Command::Inventory { action } => {
            let netbox = NetBoxClient::new(&config.netbox, config.http_timeout_secs)?;
            match action {
                InventoryAction::List { endpoint, filters } => {
                    let filters: Vec<(&str, &str)> = filters.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
                    let records = netbox.list(endpoint, &filters).await?;
                    print_json(&Value::Array(records))
                }
                InventoryAction::Get { endpoint, id } => print_json(&netbox.get(endpoint, id).await?),
                InventoryAction::Delete { endpoint, ids } => {
                    let deleted = netbox.delete(endpoint, &ids).await?;
                    println!("Deleted {deleted} {endpoint} record(s)");
                    Ok(())
                }
            }
        }
    }
}

async fn sync(config: &Config, profile: SyncProfile, target: SyncTarget, only: Option<&str>) -> Result<()> {
    if !config.netbox.is_configured() {
        tracing::warn!("NETBOX_API_TOKEN is not set, requests will be anonymous");
    }
    let netbox = Arc::new(NetBoxClient::new(&config.netbox, config.http_timeout_secs)?);

    let mut reports = Vec::new();
    for (name, xen_config) in datacenters(config, only)? {
        if !xen_config.is_configured() {
            tracing::warn!(datacenter = %name, "Xen API token is not set, requests will be anonymous");
        }
        let xen = Arc::new(XenClient::new(xen_config, config.http_timeout_secs)?);
        let reconciler = Reconciler::new(xen, netbox.clone(), netbox.clone(), profile.clone());
        info!(datacenter = %name, "Syncing datacenter");

        for kind in target.kinds() {
            match reconciler.run(kind).await {
                Ok(report) => reports.push((name.as_str(), report)),
                Err(e) => {
                    report::print_sync_reports(&reports);
                    return Err(e).with_context(|| format!("{kind} sync aborted in datacenter {name}"));
                }
            }
        }
    }
    report::print_sync_reports(&reports);
    Ok(())
}

/// Configured Xen datacenters, or just `only` when given.
fn datacenters<'a>(config: &'a Config, only: Option<&str>) -> Result<Vec<(&'a String, &'a XenConfig)>> {
    match only {
        Some(wanted) => match config.xen.get_key_value(&wanted.to_lowercase()) {
            Some(entry) => Ok(vec![entry]),
            None => bail!(
                "unknown datacenter '{wanted}' (configured: {})",
                config.xen.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
            ),
        },
        None => Ok(config.xen.iter().collect()),
    }
}

fn to_values<T: serde::Serialize>(records: &[T]) -> Result<Vec<Value>> {
    records
        .iter()
        .map(|r| serde_json::to_value(r).context("failed to serialize record"))
        .collect()
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! Stdout summaries and CSV output.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use invsync_connector::{SyncReport, VersionReport, VersionStatus};
use invsync_core::profile::ExportMap;

/// One row per `(datacenter, report)`.
pub fn print_sync_reports(reports: &[(&str, SyncReport)]) {
    println!(
        "{:<12} {:<8} {:>8} {:>8} {:>9} {:>11} {:>9} {:>8}",
        "datacenter", "kind", "examined", "created", "identical", "conflicting", "not_found", "excluded"
    );
    for (datacenter, r) in reports {
        println!(
            "{:<12} {:<8} {:>8} {:>8} {:>9} {:>11} {:>9} {:>8}",
            datacenter,
            r.kind.to_string(),
            r.examined,
            r.created,
            r.identical,
            r.conflicting,
            r.not_found,
            r.excluded
        );
    }
}

pub fn print_version_report(report: &VersionReport) {
    println!("Salt version report (target {})", report.target);
    for status in [
        VersionStatus::NeedsUpdate,
        VersionStatus::HigherVersion,
        VersionStatus::Unresponsive,
    ] {
        let entries: Vec<_> = report.with_status(status).collect();
        if entries.is_empty() {
            continue;
        }
        println!("\n{status} ({}):", entries.len());
        for entry in entries {
            println!(
                "  {:<40} {:<12} {}",
                entry.minion_id,
                entry.installed.as_deref().unwrap_or("-"),
                entry.os.as_deref().unwrap_or("")
            );
        }
    }
    println!(
        "\n{} up to date, {} need update, {} higher, {} unresponsive",
        report.count(VersionStatus::UpToDate),
        report.count(VersionStatus::NeedsUpdate),
        report.count(VersionStatus::HigherVersion),
        report.count(VersionStatus::Unresponsive)
    );
}

#[derive(Serialize)]
struct VersionRow<'a> {
    minion_id: &'a str,
    installed_version: &'a str,
    os: &'a str,
    status: String,
}

/// Write the report to `<dir>/<target>_report.csv` and return the path.
pub fn write_version_csv(dir: &Path, salt_target: &str, report: &VersionReport) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create report dir: {}", dir.display()))?;
    let path = dir.join(format!("{}_report.csv", file_stem(salt_target)));

    let mut wtr = csv_writer(&path)?;
    for entry in &report.entries {
        wtr.serialize(VersionRow {
            minion_id: &entry.minion_id,
            installed_version: entry.installed.as_deref().unwrap_or_default(),
            os: entry.os.as_deref().unwrap_or_default(),
            status: entry.status.to_string(),
        })
        .context("CSV write error")?;
    }
    wtr.flush().with_context(|| format!("failed to flush CSV: {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = report.entries.len(), "Wrote version report");
    Ok(path)
}

/// Project serialized records through an export map into CSV rows.
pub fn export_rows(records: &[Value], columns: &ExportMap) -> Vec<Vec<String>> {
    records
        .iter()
        .map(|record| {
            columns
                .values()
                .map(|column| {
                    let raw = lookup(record, &column.field).cloned().unwrap_or(Value::Null);
                    let value = match &column.formatter {
                        Some(formatter) => formatter.apply(&raw),
                        None => raw,
                    };
                    cell(&value)
                })
                .collect()
        })
        .collect()
}

pub fn write_csv(path: &Path, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let mut wtr = csv_writer(path)?;
    wtr.write_record(headers).context("CSV write error")?;
    for row in rows {
        wtr.write_record(row).context("CSV write error")?;
    }
    wtr.flush().with_context(|| format!("failed to flush CSV: {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "Exported CSV");
    Ok(())
}

fn csv_writer(path: &Path) -> Result<csv::Writer<File>> {
    let file = File::create(path).with_context(|| format!("failed to create CSV: {}", path.display()))?;
    Ok(csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(file))
}

/// Follow a dotted path (`bios_strings.system-serial-number`, `CPUs.number`).
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(cell).collect::<Vec<_>>().join(";"),
        other => other.to_string(),
    }
}

fn file_stem(target: &str) -> String {
    let stem: String = target
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '.') { c } else { '_' })
        .collect();
    if stem.trim_matches('_').is_empty() {
        "all".to_string()
    } else {
        stem
    }
}

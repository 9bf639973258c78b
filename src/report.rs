//! Tabular and JSON views of trees and stored snapshots for the CLI.

use crate::store::{PathMatcher, StoredSnapshot};
use crate::tree::{LocalEntry, ObjectTree};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde::Serialize;

/// One entry of a scanned local tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRow {
    pub path: String,
    pub kind: String,
    pub last_write_utc: String,
    pub guid: Option<String>,
}

/// One stored mapping record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRow {
    pub remote_id: String,
    pub kind: String,
    pub local_path: String,
    pub remote_path: String,
    pub change_token: Option<String>,
    pub checksum: Option<String>,
}

/// Rows for every entry below the root, paths relative to it
pub fn scan_rows(tree: &ObjectTree<LocalEntry>) -> Vec<ScanRow> {
    let root = tree.item.path.clone();
    tree.iter()
        .skip(1)
        .map(|entry| ScanRow {
            path: entry
                .path
                .strip_prefix(&root)
                .unwrap_or(&entry.path)
                .display()
                .to_string(),
            kind: entry.kind.to_string(),
            last_write_utc: entry.last_write_utc.to_rfc3339(),
            guid: entry.guid.map(|g| g.to_string()),
        })
        .collect()
}

pub fn snapshot_rows(snapshot: &StoredSnapshot, matcher: &PathMatcher) -> Vec<SnapshotRow> {
    snapshot
        .objects()
        .iter()
        .enumerate()
        .map(|(idx, object)| SnapshotRow {
            remote_id: object.remote_object_id.clone(),
            kind: object.kind.to_string(),
            local_path: snapshot.local_path(idx, matcher).display().to_string(),
            remote_path: snapshot.remote_path(idx, matcher),
            change_token: object.last_change_token.clone(),
            checksum: object.last_checksum.as_ref().map(|digest| {
                format!(
                    "{}:{}",
                    object.checksum_algorithm.as_deref().unwrap_or("?"),
                    hex::encode(digest)
                )
            }),
        })
        .collect()
}

pub fn format_scan_text(rows: &[ScanRow]) -> String {
    if rows.is_empty() {
        return "No entries.\n".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Path", "Kind", "Last write (UTC)", "GUID"]);
    for row in rows {
        table.add_row(vec![
            row.path.clone(),
            row.kind.clone(),
            row.last_write_utc.clone(),
            row.guid.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    format!("{}\n{} entries\n", table, rows.len())
}

pub fn format_snapshot_text(rows: &[SnapshotRow]) -> String {
    if rows.is_empty() {
        return "Nothing synchronized yet.\n".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Remote id", "Kind", "Local path", "Change token", "Checksum"]);
    for row in rows {
        let checksum = row
            .checksum
            .as_deref()
            .map(|c| c.chars().take(19).collect::<String>())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            row.remote_id.clone(),
            row.kind.clone(),
            row.local_path.clone(),
            row.change_token.clone().unwrap_or_else(|| "-".to_string()),
            checksum,
        ]);
    }
    format!("{}\n{} records\n", table, rows.len())
}

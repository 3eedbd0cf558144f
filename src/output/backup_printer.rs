//! Backup table rows and listing order

use std::cmp::Ordering;

use chrono::{DateTime, TimeDelta, Utc};
use kube::ResourceExt;

use crate::crd::{Backup, BackupPhase};

use super::{format_label_selector, human_readable_time_from_now, TableRow};

/// Rows for a collection of backups, in display order
pub fn print_backup_list(mut backups: Vec<Backup>, now: DateTime<Utc>) -> Vec<TableRow> {
    sort_backups_by_prefix_and_timestamp(&mut backups);
    backups
        .iter()
        .map(|backup| print_backup(backup, now))
        .collect()
}

/// Sort alphabetically by default, but when backups stem from a common
/// schedule (detected by the presence of a 14-digit timestamp suffix), sort
/// within that group from newest to oldest (prefix ascending, suffix
/// descending).
pub fn sort_backups_by_prefix_and_timestamp(backups: &mut [Backup]) {
    backups.sort_by(|a, b| compare_backup_names(&a.name_any(), &b.name_any()));
}

fn compare_backup_names(a: &str, b: &str) -> Ordering {
    match (timestamp_suffix(a), timestamp_suffix(b)) {
        // same schedule prefix, newest first
        (Some((a_prefix, a_suffix)), Some((b_prefix, b_suffix))) if a_prefix == b_prefix => {
            b_suffix.cmp(a_suffix)
        }
        _ => a.cmp(b),
    }
}

/// Split `name` into (prefix, digits) when it ends in `-` + 14 digits
fn timestamp_suffix(name: &str) -> Option<(&str, &str)> {
    let bytes = name.as_bytes();
    if bytes.len() < 15 {
        return None;
    }
    let split = bytes.len() - 15;
    if bytes[split] != b'-' || !bytes[split + 1..].iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some((&name[..split], &name[split + 1..]))
}

/// One row for a backup
pub fn print_backup(backup: &Backup, now: DateTime<Utc>) -> TableRow {
    let status = backup.status.as_ref();

    let expiration = status.and_then(|s| s.expiration).or_else(|| {
        let ttl = backup.spec.ttl.filter(|ttl| !ttl.is_zero())?;
        let created = backup.metadata.creation_timestamp.as_ref()?.0;
        Some(created + TimeDelta::from_std(ttl).unwrap_or_else(|_| TimeDelta::zero()))
    });

    let phase = status.and_then(|s| s.phase).unwrap_or(BackupPhase::New);
    let mut display_status = phase.to_string();
    if backup.metadata.deletion_timestamp.is_some() {
        display_status = "Deleting".to_string();
    }
    if display_status == BackupPhase::PartiallyFailed.to_string() {
        let errors = status.map(|s| s.errors).unwrap_or_default();
        if errors == 1 {
            display_status = format!("{display_status} (1 error)");
        } else {
            display_status = format!("{display_status} ({errors} errors)");
        }
    }

    let created = status
        .and_then(|s| s.start_timestamp)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "n/a".to_string());

    TableRow {
        cells: vec![
            backup.name_any(),
            display_status,
            created,
            human_readable_time_from_now(expiration, now),
            backup.spec.storage_location.clone(),
            format_label_selector(backup.spec.label_selector.as_ref()),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(names: &[&str]) -> Vec<String> {
        let mut names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        names.sort_by(|a, b| compare_backup_names(a, b));
        names
    }

    #[test]
    fn plain_names_sort_alphabetically() {
        assert_eq!(sorted(&["b", "c", "a"]), vec!["a", "b", "c"]);
    }

    #[test]
    fn schedule_groups_sort_newest_first() {
        assert_eq!(
            sorted(&[
                "daily-20210101010101",
                "daily-20210102010101",
                "adhoc",
                "daily-20210101010102",
            ]),
            vec![
                "adhoc",
                "daily-20210102010101",
                "daily-20210101010102",
                "daily-20210101010101",
            ]
        );
    }

    #[test]
    fn different_prefixes_sort_alphabetically() {
        assert_eq!(
            sorted(&["weekly-20210101010101", "daily-20210102010101"]),
            vec!["daily-20210102010101", "weekly-20210101010101"]
        );
    }

    #[test]
    fn sorting_is_idempotent() {
        let input = [
            "daily-20210102010101",
            "adhoc",
            "daily-20210101010101",
            "zz",
        ];
        let once = sorted(&input);
        let twice = sorted(&once.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(once, twice);
    }

    #[test]
    fn suffix_detection() {
        assert!(timestamp_suffix("daily-20210101010101").is_some());
        assert!(timestamp_suffix("daily-2021010101010").is_none());
        assert!(timestamp_suffix("daily-2021010101010a").is_none());
        assert!(timestamp_suffix("20210101010101").is_none());
        assert_eq!(
            timestamp_suffix("daily-20210101010101"),
            Some(("daily", "20210101010101"))
        );
    }
}

//! Tabular output for backup resources
//!
//! Produces printer rows consumed by the CLI layer. Row derivation is pure:
//! the caller supplies the current instant so output is reproducible.

mod backup_printer;
mod schedule_printer;

pub use backup_printer::{print_backup, print_backup_list, sort_backups_by_prefix_and_timestamp};
pub use schedule_printer::{print_schedule, print_schedule_list};

use chrono::{DateTime, TimeDelta, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

/// Column headers for backup tables
pub const BACKUP_COLUMNS: [&str; 6] = [
    "Name",
    "Status",
    "Created",
    "Expires",
    "Storage Location",
    "Selector",
];

/// Column headers for schedule tables
pub const SCHEDULE_COLUMNS: [&str; 7] = [
    "Name",
    "Status",
    "Created",
    "Schedule",
    "Backup TTL",
    "Last Backup",
    "Selector",
];

/// One printed row, cells in column order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRow {
    pub cells: Vec<String>,
}

/// Render a duration in the short human form used by table output:
/// `13s`, `5m`, `3h`, `42d`, `2y`.
pub fn short_human_duration(duration: TimeDelta) -> String {
    let seconds = duration.num_seconds();
    if seconds < 0 {
        return "0s".to_string();
    }
    if seconds < 60 {
        return format!("{seconds}s");
    }

    let minutes = duration.num_minutes();
    if minutes < 60 {
        return format!("{minutes}m");
    }

    let hours = duration.num_hours();
    if hours < 24 {
        return format!("{hours}h");
    }
    if hours < 24 * 365 {
        return format!("{}d", hours / 24);
    }
    format!("{}y", hours / 24 / 365)
}

/// Render an instant relative to `now`, with past instants suffixed " ago"
/// and an absent instant rendered "n/a".
pub fn human_readable_time_from_now(when: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match when {
        None => "n/a".to_string(),
        Some(when) if when >= now => short_human_duration(when - now),
        Some(when) => format!("{} ago", short_human_duration(now - when)),
    }
}

/// Canonical short form of a label selector; absent or empty selectors
/// render "<none>".
pub fn format_label_selector(selector: Option<&LabelSelector>) -> String {
    let Some(selector) = selector else {
        return "<none>".to_string();
    };

    let mut parts = Vec::new();

    if let Some(labels) = &selector.match_labels {
        for (key, value) in labels {
            parts.push(format!("{key}={value}"));
        }
    }

    if let Some(expressions) = &selector.match_expressions {
        for requirement in expressions {
            let values = requirement
                .values
                .as_deref()
                .unwrap_or_default()
                .join(",");
            let part = match requirement.operator.as_str() {
                "In" => format!("{} in ({values})", requirement.key),
                "NotIn" => format!("{} notin ({values})", requirement.key),
                "Exists" => requirement.key.clone(),
                "DoesNotExist" => format!("!{}", requirement.key),
                other => format!("{} {other} ({values})", requirement.key),
            };
            parts.push(part);
        }
    }

    if parts.is_empty() {
        return "<none>".to_string();
    }
    parts.join(",")
}

//! Schedule table rows

use chrono::{DateTime, TimeDelta, Utc};
use kube::ResourceExt;

use crate::crd::{Schedule, SchedulePhase};

use super::{format_label_selector, human_readable_time_from_now, short_human_duration, TableRow};

/// Rows for a collection of schedules, in input order
pub fn print_schedule_list(schedules: &[Schedule], now: DateTime<Utc>) -> Vec<TableRow> {
    schedules
        .iter()
        .map(|schedule| print_schedule(schedule, now))
        .collect()
}

/// One row for a schedule
pub fn print_schedule(schedule: &Schedule, now: DateTime<Utc>) -> TableRow {
    let status = schedule.status.as_ref();

    let phase = status.and_then(|s| s.phase).unwrap_or(SchedulePhase::New);

    let created = schedule
        .metadata
        .creation_timestamp
        .as_ref()
        .map(|t| t.0.to_rfc3339())
        .unwrap_or_else(|| "n/a".to_string());

    let ttl = schedule
        .spec
        .template
        .ttl
        .map(|ttl| {
            short_human_duration(TimeDelta::from_std(ttl).unwrap_or_else(|_| TimeDelta::zero()))
        })
        .unwrap_or_else(|| "0s".to_string());

    TableRow {
        cells: vec![
            schedule.name_any(),
            phase.to_string(),
            created,
            schedule.spec.schedule.clone(),
            ttl,
            human_readable_time_from_now(status.and_then(|s| s.last_backup), now),
            format_label_selector(schedule.spec.template.label_selector.as_ref()),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{BackupSpec, ScheduleSpec, ScheduleStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::time::Duration;

    #[test]
    fn schedule_row_cells() {
        let now: DateTime<Utc> = "2021-06-01T00:00:00Z".parse().unwrap();
        let schedule = Schedule {
            metadata: ObjectMeta {
                name: Some("daily".to_string()),
                namespace: Some("velero".to_string()),
                ..Default::default()
            },
            spec: ScheduleSpec {
                schedule: "0 1 * * *".to_string(),
                template: BackupSpec {
                    ttl: Some(Duration::from_secs(720 * 3600)),
                    ..Default::default()
                },
            },
            status: Some(ScheduleStatus {
                phase: Some(SchedulePhase::Enabled),
                last_backup: Some(now - TimeDelta::hours(23)),
                validation_errors: Vec::new(),
            }),
        };

        let row = print_schedule(&schedule, now);
        assert_eq!(
            row.cells,
            vec!["daily", "Enabled", "n/a", "0 1 * * *", "30d", "23h ago", "<none>"]
        );
    }

    #[test]
    fn missing_status_renders_new() {
        let now = Utc::now();
        let schedule = Schedule {
            metadata: ObjectMeta {
                name: Some("weekly".to_string()),
                ..Default::default()
            },
            spec: ScheduleSpec {
                schedule: "0 1 * * 0".to_string(),
                template: BackupSpec::default(),
            },
            status: None,
        };

        let row = print_schedule(&schedule, now);
        assert_eq!(row.cells[1], "New");
        assert_eq!(row.cells[4], "0s");
        assert_eq!(row.cells[5], "n/a");
    }
}

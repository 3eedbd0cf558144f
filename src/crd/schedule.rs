//! Schedule Custom Resource Definition
//!
//! Schedules stamp out Backups on a cron cadence. Their controller lives
//! outside this operator; the type exists here so schedule collections can be
//! printed alongside backups.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::BackupSpec;

/// Schedule resource specification
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "velero.io",
    version = "v1",
    kind = "Schedule",
    plural = "schedules",
    singular = "schedule",
    namespaced,
    status = "ScheduleStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "Schedule", "type": "string", "jsonPath": ".spec.schedule"}"#,
    printcolumn = r#"{"name": "Last Backup", "type": "string", "jsonPath": ".status.lastBackup"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSpec {
    /// Cron expression describing when backups are created
    pub schedule: String,

    /// Template for the Backups this schedule creates
    #[serde(default)]
    pub template: BackupSpec,
}

/// Progress tag for a Schedule
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum SchedulePhase {
    New,
    Enabled,
    FailedValidation,
}

impl std::fmt::Display for SchedulePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            SchedulePhase::New => "New",
            SchedulePhase::Enabled => "Enabled",
            SchedulePhase::FailedValidation => "FailedValidation",
        };
        f.write_str(phase)
    }
}

/// Schedule status, written by the schedule controller
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStatus {
    /// Current phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<SchedulePhase>,

    /// When this schedule last produced a Backup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_backup: Option<DateTime<Utc>>,

    /// Problems with the schedule spec
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
}

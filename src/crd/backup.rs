//! Backup Custom Resource Definition

use std::time::Duration;

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label attached to every processed Backup, recording the storage location
/// it targets. Values longer than the Kubernetes label limit are shortened
/// with a stable hash suffix.
pub const STORAGE_LOCATION_LABEL: &str = "velero.io/storage-location";

/// Backup resource specification
///
/// A Backup describes one point-in-time capture of cluster state. The spec is
/// authored by the user and never mutated in place by the controller; the
/// controller works on a defaulted copy and writes results to the status.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "velero.io",
    version = "v1",
    kind = "Backup",
    plural = "backups",
    singular = "backup",
    namespaced,
    status = "BackupStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "Started", "type": "string", "jsonPath": ".status.startTimestamp"}"#,
    printcolumn = r#"{"name": "Expires", "type": "string", "jsonPath": ".status.expiration"}"#,
    printcolumn = r#"{"name": "Storage Location", "type": "string", "jsonPath": ".spec.storageLocation"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    /// Resource types to include. Empty means all types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_resources: Vec<String>,

    /// Resource types to exclude. Must be disjoint from the includes list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_resources: Vec<String>,

    /// Namespaces to include. Empty means all namespaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_namespaces: Vec<String>,

    /// Namespaces to exclude. Must be disjoint from the includes list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_namespaces: Vec<String>,

    /// Label selector limiting which items are backed up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,

    /// Whether to snapshot persistent volumes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_volumes: Option<bool>,

    /// Name of the BackupStorageLocation to persist this backup to.
    /// Empty selects the server default.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub storage_location: String,

    /// Names of the VolumeSnapshotLocations to use, at most one per provider
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_snapshot_locations: Vec<String>,

    /// Retention period. Absent or zero selects the server default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,

    /// Hooks to run inside pods during the backup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hooks: Option<BackupHooks>,
}

/// Hooks scoped to a backup run
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupHooks {
    /// Hook definitions applied to matching resources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceHookSpec>,
}

/// A named hook with the resources it applies to
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceHookSpec {
    /// Hook name, used in logs
    pub name: String,

    /// Namespaces the hook applies to. Empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_namespaces: Vec<String>,

    /// Namespaces the hook never applies to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_namespaces: Vec<String>,

    /// Label selector limiting the pods the hook runs in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,

    /// Commands run before the item is backed up
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre: Vec<ExecHook>,

    /// Commands run after the item is backed up
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post: Vec<ExecHook>,
}

/// A command executed inside a container
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecHook {
    /// Container to exec in. Empty selects the first container.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container: String,

    /// Command and arguments
    pub command: Vec<String>,

    /// How long to wait before giving up on the command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

/// Progress tag for a Backup, owned by the controller
///
/// Only an absent phase or `New` is eligible for processing; every other
/// phase is terminal for this controller. `Deleting` is synthesized by the
/// printer from a deletion timestamp and is deliberately not part of this
/// enum.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum BackupPhase {
    New,
    FailedValidation,
    InProgress,
    Completed,
    PartiallyFailed,
    Failed,
}

impl std::fmt::Display for BackupPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            BackupPhase::New => "New",
            BackupPhase::FailedValidation => "FailedValidation",
            BackupPhase::InProgress => "InProgress",
            BackupPhase::Completed => "Completed",
            BackupPhase::PartiallyFailed => "PartiallyFailed",
            BackupPhase::Failed => "Failed",
        };
        f.write_str(phase)
    }
}

/// Backup status, written by the controller
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatus {
    /// Current phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<BackupPhase>,

    /// Output format version of the persisted backup
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub version: i32,

    /// When the backup run started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<DateTime<Utc>>,

    /// When the backup run reached a terminal phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_timestamp: Option<DateTime<Utc>>,

    /// When the backup becomes eligible for garbage collection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,

    /// User-correctable problems that prevented the backup from running
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,

    /// Per-item errors recorded by the backup pipeline
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub errors: u64,

    /// Per-item warnings recorded by the backup pipeline
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub warnings: u64,

    /// Storage location the backup was (or would have been) written to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_location: Option<String>,
}

fn is_zero_i32(n: &i32) -> bool {
    *n == 0
}

fn is_zero_u64(n: &u64) -> bool {
    *n == 0
}

/// Mutable access to the status, inserting the default if absent
pub fn status_mut(backup: &mut Backup) -> &mut BackupStatus {
    backup.status.get_or_insert_with(BackupStatus::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_serializes_as_bare_name() {
        let json = serde_json::to_string(&BackupPhase::PartiallyFailed).unwrap();
        assert_eq!(json, "\"PartiallyFailed\"");
    }

    #[test]
    fn status_omits_empty_fields() {
        let status = BackupStatus::default();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn completion_timestamp_round_trips_rfc3339() {
        let status = BackupStatus {
            completion_timestamp: Some("2006-01-02T22:04:05Z".parse().unwrap()),
            ..Default::default()
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"completionTimestamp\":\"2006-01-02T22:04:05Z\""));
    }
}

//! BackupStorageLocation Custom Resource Definition

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// BackupStorageLocation resource specification
///
/// A named pointer to a bucket in an external object store. Backups may only
/// run against locations in `ReadWrite` mode.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "velero.io",
    version = "v1",
    kind = "BackupStorageLocation",
    plural = "backupstoragelocations",
    singular = "backupstoragelocation",
    shortname = "bsl",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name": "Provider", "type": "string", "jsonPath": ".spec.provider"}"#,
    printcolumn = r#"{"name": "Bucket", "type": "string", "jsonPath": ".spec.objectStorage.bucket"}"#,
    printcolumn = r#"{"name": "Access Mode", "type": "string", "jsonPath": ".spec.accessMode"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackupStorageLocationSpec {
    /// Object store provider tag (aws, gcp, azure, ...)
    pub provider: String,

    /// Bucket and optional prefix within the object store
    pub object_storage: ObjectStorageLocation,

    /// Whether the operator may write to this location
    #[serde(default)]
    pub access_mode: BackupStorageLocationAccessMode,

    /// Provider-specific configuration
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
}

/// Bucket coordinates within an object store
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStorageLocation {
    /// Bucket name
    pub bucket: String,

    /// Key prefix under which all operator objects are stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// Access mode for a storage location
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum BackupStorageLocationAccessMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

//! Backup persistence seam
//!
//! One object group per backup lives under
//! `<bucket>/<prefix>/<backup-name>/` in the external object store: a
//! metadata object holding the backup resource serialization and the artifact
//! stream produced by the item pipeline.

mod file_store;

pub use file_store::FileSystemBackupStore;

use async_trait::async_trait;

use crate::error::Result;

/// Name of the metadata object within a backup's key prefix
pub const METADATA_OBJECT: &str = "velero-backup.json";

/// Everything uploaded for one backup
#[derive(Clone, Debug)]
pub struct BackupInfo {
    /// Backup name, also the final path segment of the key prefix
    pub name: String,

    /// Resource serialization with the completion timestamp already stamped
    pub metadata: Vec<u8>,

    /// Artifact stream written by the item pipeline
    pub contents: Vec<u8>,
}

/// Driver for one backup storage location
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Whether an object group for `backup_name` already exists.
    ///
    /// Callers treat an error the same as `true`: the store could not prove
    /// the name is free, so writing would risk a double-write.
    async fn backup_exists(&self, bucket: &str, backup_name: &str) -> Result<bool>;

    /// Upload the metadata and artifact objects for one backup
    async fn put_backup(&self, info: BackupInfo) -> Result<()>;
}

/// Key prefix for one backup's objects, relative to the bucket root
pub fn backup_key_prefix(prefix: Option<&str>, backup_name: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => {
            format!("{}/{}", prefix.trim_matches('/'), backup_name)
        }
        _ => backup_name.to_string(),
    }
}

/// Key of a backup's metadata object, relative to the bucket root
pub fn metadata_key(prefix: Option<&str>, backup_name: &str) -> String {
    format!("{}/{METADATA_OBJECT}", backup_key_prefix(prefix, backup_name))
}

/// Key of a backup's artifact object, relative to the bucket root
pub fn artifact_key(prefix: Option<&str>, backup_name: &str) -> String {
    format!(
        "{}/{backup_name}.tar.gz",
        backup_key_prefix(prefix, backup_name)
    )
}

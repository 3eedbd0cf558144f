//! Filesystem-backed backup store
//!
//! Stores backups under a mounted volume using the same key layout a remote
//! object store would see. This is the default wiring for locations whose
//! provider has no dedicated driver configured, and doubles as the local
//! development store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::crd::BackupStorageLocation;
use crate::error::{Error, Result};

use super::{artifact_key, metadata_key, BackupInfo, BackupStore};

/// Backup store writing objects beneath a local root directory
#[derive(Clone, Debug)]
pub struct FileSystemBackupStore {
    root: PathBuf,
    bucket: String,
    prefix: Option<String>,
}

impl FileSystemBackupStore {
    /// Create a store for one location, rooted at `root`
    pub fn new(root: impl AsRef<Path>, location: &BackupStorageLocation) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            bucket: location.spec.object_storage.bucket.clone(),
            prefix: location.spec.object_storage.prefix.clone(),
        }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(&self.bucket).join(key)
    }
}

#[async_trait]
impl BackupStore for FileSystemBackupStore {
    async fn backup_exists(&self, bucket: &str, backup_name: &str) -> Result<bool> {
        if bucket != self.bucket {
            return Err(Error::storage(format!(
                "store is bound to bucket {}, got {bucket}",
                self.bucket
            )));
        }

        let path = self.object_path(&metadata_key(self.prefix.as_deref(), backup_name));
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn put_backup(&self, info: BackupInfo) -> Result<()> {
        let metadata_path = self.object_path(&metadata_key(self.prefix.as_deref(), &info.name));
        let artifact_path = self.object_path(&artifact_key(self.prefix.as_deref(), &info.name));

        if let Some(parent) = metadata_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&metadata_path, &info.metadata).await?;
        tokio::fs::write(&artifact_path, &info.contents).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{BackupStorageLocationSpec, ObjectStorageLocation};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "cluster-backup-operator-{tag}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn location(bucket: &str, prefix: Option<&str>) -> BackupStorageLocation {
        BackupStorageLocation {
            metadata: ObjectMeta {
                name: Some("loc-1".to_string()),
                namespace: Some("velero".to_string()),
                ..Default::default()
            },
            spec: BackupStorageLocationSpec {
                provider: "filesystem".to_string(),
                object_storage: ObjectStorageLocation {
                    bucket: bucket.to_string(),
                    prefix: prefix.map(str::to_string),
                },
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn exists_then_put_then_exists() {
        let root = scratch_dir("roundtrip");
        let store = FileSystemBackupStore::new(&root, &location("store-1", Some("cluster-a")));

        assert!(!store.backup_exists("store-1", "backup-1").await.unwrap());

        store
            .put_backup(BackupInfo {
                name: "backup-1".to_string(),
                metadata: b"{}".to_vec(),
                contents: Vec::new(),
            })
            .await
            .unwrap();

        assert!(store.backup_exists("store-1", "backup-1").await.unwrap());
        assert!(root
            .join("store-1/cluster-a/backup-1/velero-backup.json")
            .is_file());
        assert!(root
            .join("store-1/cluster-a/backup-1/backup-1.tar.gz")
            .is_file());

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn wrong_bucket_is_an_error() {
        let root = scratch_dir("bucket");
        let store = FileSystemBackupStore::new(&root, &location("store-1", None));

        assert!(store.backup_exists("other", "backup-1").await.is_err());

        std::fs::remove_dir_all(&root).unwrap();
    }
}

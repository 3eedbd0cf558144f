//! Backup request and item pipeline seam

use std::sync::Arc;

use async_trait::async_trait;

use crate::crd::{Backup, BackupStorageLocation, VolumeSnapshotLocation};
use crate::error::Result;
use crate::plugin::{BackupItemAction, PluginManager};

/// Output format version written into `status.version`
pub const BACKUP_VERSION: i32 = 1;

/// Working copy of a Backup during one reconcile
///
/// Produced by the request builder: a deep copy of the user's Backup with
/// defaults applied and status seeded, plus the resolved storage and snapshot
/// locations. The request never replaces the canonical resource; the final
/// status write marshals it back through the API client.
#[derive(Clone, Debug)]
pub struct Request {
    /// Defaulted copy of the Backup being processed
    pub backup: Backup,

    /// Resolved storage location, present once validation has seen it
    pub storage_location: Option<Arc<BackupStorageLocation>>,

    /// One resolved snapshot location per provider, ordered by name
    pub snapshot_locations: Vec<Arc<VolumeSnapshotLocation>>,
}

impl Request {
    /// Wrap a deep copy of `backup` with no locations resolved yet
    pub fn new(backup: Backup) -> Self {
        Self {
            backup,
            storage_location: None,
            snapshot_locations: Vec::new(),
        }
    }
}

/// The per-item backup pipeline
///
/// Implementations walk the cluster, write the artifact stream into
/// `backup_file`, and record per-item problems by bumping
/// `request.backup.status.errors` / `warnings`. A returned error is a hard
/// pipeline failure.
#[async_trait]
pub trait Backupper: Send + Sync {
    async fn backup(
        &self,
        request: &mut Request,
        backup_file: &mut Vec<u8>,
        actions: Vec<Arc<dyn BackupItemAction>>,
        volume_snapshotter_getter: Arc<dyn PluginManager>,
    ) -> Result<()>;
}

/// Pipeline used until a real item pipeline is wired in
///
/// Produces an empty artifact and records no per-item problems, which keeps
/// the controller's phase machine and persistence paths exercisable
/// end-to-end.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopBackupper;

#[async_trait]
impl Backupper for NoopBackupper {
    async fn backup(
        &self,
        _request: &mut Request,
        _backup_file: &mut Vec<u8>,
        _actions: Vec<Arc<dyn BackupItemAction>>,
        _volume_snapshotter_getter: Arc<dyn PluginManager>,
    ) -> Result<()> {
        Ok(())
    }
}

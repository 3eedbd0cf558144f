//! Plugin seams
//!
//! Item actions and volume snapshotters are provided by external plugin
//! processes. The reconciler acquires a [`PluginManager`] per reconcile and
//! releases it on every exit path; it never calls the actions itself, it only
//! hands them to the item pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::crd::Backup;
use crate::error::{Error, Result};

/// Which items a backup item action applies to
#[derive(Clone, Debug, Default)]
pub struct ResourceSelector {
    /// Resource types the action applies to. Empty means all.
    pub included_resources: Vec<String>,

    /// Resource types the action never applies to
    pub excluded_resources: Vec<String>,

    /// Label selector string limiting matching items
    pub label_selector: Option<String>,
}

/// A plugin hook invoked for each matching item during a backup
#[async_trait]
pub trait BackupItemAction: Send + Sync {
    /// The items this action wants to see
    fn applies_to(&self) -> Result<ResourceSelector>;

    /// Transform one item, returning the (possibly modified) payload
    async fn execute(&self, item: Value, backup: &Backup) -> Result<Value>;
}

/// A provider-specific volume snapshotter
#[async_trait]
pub trait VolumeSnapshotter: Send + Sync {
    /// Create a snapshot of the given volume, returning the snapshot id
    async fn create_snapshot(
        &self,
        volume_id: &str,
        volume_az: &str,
        tags: &HashMap<String, String>,
    ) -> Result<String>;
}

/// Handle on the plugin processes backing one reconcile
///
/// Managers are scoped to a single reconcile and may carry per-run state;
/// `cleanup_clients` must be called on every exit path.
pub trait PluginManager: Send + Sync {
    /// All registered backup item actions
    fn get_backup_item_actions(&self) -> Result<Vec<Arc<dyn BackupItemAction>>>;

    /// The volume snapshotter registered for a provider
    fn get_volume_snapshotter(&self, provider: &str) -> Result<Arc<dyn VolumeSnapshotter>>;

    /// Tear down plugin processes started for this reconcile
    fn cleanup_clients(&self);
}

/// Plugin manager used when no external plugins are configured
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPluginManager;

impl PluginManager for NoopPluginManager {
    fn get_backup_item_actions(&self) -> Result<Vec<Arc<dyn BackupItemAction>>> {
        Ok(Vec::new())
    }

    fn get_volume_snapshotter(&self, provider: &str) -> Result<Arc<dyn VolumeSnapshotter>> {
        Err(Error::plugin(format!(
            "no volume snapshotter registered for provider {provider}"
        )))
    }

    fn cleanup_clients(&self) {}
}

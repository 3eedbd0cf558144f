//! Backup reconciler
//!
//! Drives a Backup through its phase machine:
//! - builds a defaulted, validated request from the cached resource
//! - transitions `New`/empty backups to `InProgress` or `FailedValidation`
//! - runs the item pipeline and uploads the artifact with idempotency
//!   against the object store
//! - writes the terminal phase and counts back through the API client
//!
//! Every dependency with I/O or time behind it is injected at construction
//! so the phase machine is testable with frozen clocks and mock stores.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};
use serde_json::json;
use tracing::{debug, error, info};

use crate::backup::{Backupper, Request, BACKUP_VERSION};
use crate::cache::ResourceCache;
use crate::clock::Clock;
use crate::config::BackupDefaults;
use crate::crd::{
    status_mut, Backup, BackupPhase, BackupStorageLocation, BackupStorageLocationAccessMode,
    VolumeSnapshotLocation, STORAGE_LOCATION_LABEL,
};
use crate::error::{Error, Result};
use crate::label;
use crate::metrics;
use crate::persistence::{BackupInfo, BackupStore};
use crate::plugin::PluginManager;
use crate::tracker::BackupTracker;

/// Field manager recorded on API writes
const FIELD_MANAGER: &str = "cluster-backup-operator";

/// Produces a fresh plugin manager for one reconcile
pub type PluginManagerFactory = Arc<dyn Fn() -> Arc<dyn PluginManager> + Send + Sync>;

/// Produces a backup store bound to one storage location
pub type BackupStoreFactory =
    Arc<dyn Fn(&BackupStorageLocation) -> Result<Arc<dyn BackupStore>> + Send + Sync>;

/// Write access to Backup resources through the API server
#[async_trait]
pub trait BackupApi: Send + Sync {
    /// Fetch the live object
    async fn get(&self, namespace: &str, name: &str) -> Result<Backup>;

    /// Persist labels and status of `backup`, returning the stored object
    async fn update(&self, backup: &Backup) -> Result<Backup>;
}

/// Production [`BackupApi`] backed by a kube client
#[derive(Clone)]
pub struct KubeBackupApi {
    client: Client,
}

impl KubeBackupApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api_for(&self, namespace: &str) -> Api<Backup> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl BackupApi for KubeBackupApi {
    async fn get(&self, namespace: &str, name: &str) -> Result<Backup> {
        Ok(self.api_for(namespace).get(name).await?)
    }

    async fn update(&self, backup: &Backup) -> Result<Backup> {
        let namespace = backup.namespace().unwrap_or_else(|| "default".to_string());
        let name = backup.name_any();
        let api = self.api_for(&namespace);
        let params = PatchParams::apply(FIELD_MANAGER);

        api.patch(
            &name,
            &params,
            &Patch::Merge(json!({"metadata": {"labels": backup.metadata.labels}})),
        )
        .await?;

        let updated = api
            .patch_status(
                &name,
                &params,
                &Patch::Merge(json!({"status": backup.status})),
            )
            .await?;

        Ok(updated)
    }
}

/// The backup reconciliation core
pub struct BackupReconciler {
    backups: Arc<dyn ResourceCache<Backup>>,
    storage_locations: Arc<dyn ResourceCache<BackupStorageLocation>>,
    snapshot_locations: Arc<dyn ResourceCache<VolumeSnapshotLocation>>,
    api: Arc<dyn BackupApi>,
    backupper: Arc<dyn Backupper>,
    new_plugin_manager: PluginManagerFactory,
    new_backup_store: BackupStoreFactory,
    tracker: Arc<BackupTracker>,
    clock: Arc<dyn Clock>,
    defaults: BackupDefaults,
}

impl BackupReconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backups: Arc<dyn ResourceCache<Backup>>,
        storage_locations: Arc<dyn ResourceCache<BackupStorageLocation>>,
        snapshot_locations: Arc<dyn ResourceCache<VolumeSnapshotLocation>>,
        api: Arc<dyn BackupApi>,
        backupper: Arc<dyn Backupper>,
        new_plugin_manager: PluginManagerFactory,
        new_backup_store: BackupStoreFactory,
        tracker: Arc<BackupTracker>,
        clock: Arc<dyn Clock>,
        defaults: BackupDefaults,
    ) -> Self {
        Self {
            backups,
            storage_locations,
            snapshot_locations,
            api,
            backupper,
            new_plugin_manager,
            new_backup_store,
            tracker,
            clock,
            defaults,
        }
    }

    /// Reconcile one queue key.
    ///
    /// Terminal outcomes (validation failures, store conflicts, pipeline
    /// failures) are persisted onto the Backup and swallowed; the only error
    /// returned is a failed status write, which the queue retries.
    pub async fn process_backup(&self, key: &str) -> Result<()> {
        let Some((namespace, name)) = split_key(key) else {
            error!(key, "error splitting queue key");
            return Ok(());
        };

        let Some(original) = self.backups.get(namespace, name) else {
            debug!(key, "backup not found in cache");
            return Ok(());
        };

        match original.status.as_ref().and_then(|status| status.phase) {
            // only new backups are processed; every other phase is terminal
            // for this controller
            None | Some(BackupPhase::New) => {}
            Some(phase) => {
                debug!(key, %phase, "backup is not handled by this controller");
                return Ok(());
            }
        }

        let mut request = self.prepare_backup_request(&original);

        let failed_validation = request
            .backup
            .status
            .as_ref()
            .is_some_and(|status| !status.validation_errors.is_empty());
        status_mut(&mut request.backup).phase = Some(if failed_validation {
            BackupPhase::FailedValidation
        } else {
            BackupPhase::InProgress
        });

        self.api.update(&request.backup).await?;

        if failed_validation {
            info!(key, "backup failed validation");
            metrics::BACKUP_VALIDATION_FAILURES
                .with_label_values(&[namespace, name])
                .inc();
            return Ok(());
        }

        let in_flight = self.tracker.track(namespace, name);
        metrics::IN_FLIGHT_BACKUPS.set(self.tracker.len() as f64);

        info!(key, "Starting backup");
        let timer = metrics::BACKUP_DURATION
            .with_label_values(&[namespace, name])
            .start_timer();
        let outcome = self.run_backup(&mut request).await;
        timer.observe_duration();

        if let Err(ref run_error) = outcome {
            error!(key, error = %run_error, "backup failed");
            let status = status_mut(&mut request.backup);
            status.phase = Some(BackupPhase::Failed);
            if status.completion_timestamp.is_none() {
                status.completion_timestamp = Some(self.clock.now());
            }
        }

        if let Some(phase) = request.backup.status.as_ref().and_then(|s| s.phase) {
            let phase_label = phase.to_string();
            metrics::BACKUPS_TOTAL
                .with_label_values(&[phase_label.as_str(), namespace, name])
                .inc();
        }

        info!(key, "Updating backup's final status");
        let update_result = self.api.update(&request.backup).await;

        drop(in_flight);
        metrics::IN_FLIGHT_BACKUPS.set(self.tracker.len() as f64);

        update_result?;
        Ok(())
    }

    /// Materialize a validated, defaulted working copy of `backup`.
    ///
    /// Applies the defaulting rules in order (storage location, TTL, storage
    /// location label, version, start timestamp, expiration), resolves the
    /// storage and snapshot locations, and records validation errors into
    /// the seeded status. Never writes to the store.
    pub fn prepare_backup_request(&self, backup: &Backup) -> Request {
        let mut request = Request::new(backup.clone());
        let namespace = request.backup.namespace().unwrap_or_default();

        if request.backup.spec.storage_location.is_empty() {
            request.backup.spec.storage_location = self.defaults.backup_location.clone();
        }
        if request.backup.spec.ttl.is_none_or(|ttl| ttl.is_zero()) {
            request.backup.spec.ttl = Some(self.defaults.backup_ttl);
        }

        let location_name = request.backup.spec.storage_location.clone();
        request
            .backup
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(
                STORAGE_LOCATION_LABEL.to_string(),
                label::get_valid_name(&location_name),
            );

        let start = self.clock.now();
        let ttl = request
            .backup
            .spec
            .ttl
            .and_then(|ttl| TimeDelta::from_std(ttl).ok())
            .unwrap_or_else(TimeDelta::zero);
        {
            let status = status_mut(&mut request.backup);
            status.version = BACKUP_VERSION;
            status.start_timestamp = Some(start);
            status.expiration = Some(start + ttl);
            status.storage_location = Some(location_name.clone());
        }

        let mut validation_errors = Vec::new();

        if let Some(overlap) = validate_includes_excludes(
            &request.backup.spec.included_resources,
            &request.backup.spec.excluded_resources,
        ) {
            validation_errors.push(format!(
                "Invalid included/excluded resource lists: {overlap}"
            ));
        }
        if let Some(overlap) = validate_includes_excludes(
            &request.backup.spec.included_namespaces,
            &request.backup.spec.excluded_namespaces,
        ) {
            validation_errors.push(format!(
                "Invalid included/excluded namespace lists: {overlap}"
            ));
        }

        match self.storage_locations.get(&namespace, &location_name) {
            None => validation_errors.push(format!(
                "a BackupStorageLocation CRD with the name specified in the backup spec needs \
                 to be created before this backup can be executed. Error: {}",
                not_found_message("backupstoragelocation", &location_name)
            )),
            Some(location) => {
                if location.spec.access_mode == BackupStorageLocationAccessMode::ReadOnly {
                    validation_errors.push(format!(
                        "backup can't be created because backup storage location {location_name} \
                         is currently in read-only mode"
                    ));
                }
                request.storage_location = Some(location);
            }
        }

        let (provider_locations, location_errors) =
            self.validate_and_get_snapshot_locations(&request.backup);
        validation_errors.extend(location_errors);

        let mut snapshot_locations: Vec<_> = provider_locations.into_values().collect();
        snapshot_locations.sort_by_key(|location| location.name_any());
        request.snapshot_locations = snapshot_locations;

        status_mut(&mut request.backup).validation_errors = validation_errors;

        request
    }

    /// Resolve the effective snapshot location per provider.
    ///
    /// Two passes: dedupe the explicitly named locations and reject a second
    /// distinct name for the same provider, then fill the remaining
    /// providers from the configured default or, when unambiguous, the sole
    /// cluster location.
    pub fn validate_and_get_snapshot_locations(
        &self,
        backup: &Backup,
    ) -> (BTreeMap<String, Arc<VolumeSnapshotLocation>>, Vec<String>) {
        let namespace = backup.namespace().unwrap_or_default();
        let mut errors = Vec::new();
        let mut provider_locations: BTreeMap<String, Arc<VolumeSnapshotLocation>> =
            BTreeMap::new();

        for location_name in &backup.spec.volume_snapshot_locations {
            let Some(location) = self.snapshot_locations.get(&namespace, location_name) else {
                errors.push(format!(
                    "a VolumeSnapshotLocation CRD for the location {location_name} with the \
                     name specified in the backup spec needs to be created before this \
                     snapshot can be executed. Error: {}",
                    not_found_message("volumesnapshotlocation", location_name)
                ));
                continue;
            };

            let provider = location.spec.provider.clone();
            if let Some(existing) = provider_locations.get(&provider) {
                // naming the same location twice is fine, a second distinct
                // name for the provider is not
                if existing.name_any() != *location_name {
                    errors.push(format!(
                        "more than one VolumeSnapshotLocation name specified for provider \
                         {provider}: {location_name}; unexpected name was {}",
                        existing.name_any()
                    ));
                }
                continue;
            }
            provider_locations.insert(provider, location);
        }

        if !errors.is_empty() {
            return (BTreeMap::new(), errors);
        }

        let mut cluster_locations: BTreeMap<String, Vec<Arc<VolumeSnapshotLocation>>> =
            BTreeMap::new();
        for location in self.snapshot_locations.list(&namespace) {
            cluster_locations
                .entry(location.spec.provider.clone())
                .or_default()
                .push(location);
        }

        for (provider, mut locations) in cluster_locations {
            if provider_locations.contains_key(&provider) {
                continue;
            }
            if locations.len() > 1 {
                let Some(default_name) = self.defaults.snapshot_locations.get(&provider) else {
                    errors.push(format!(
                        "provider {provider} has more than one possible volume snapshot \
                         location, and none were specified explicitly or as a default"
                    ));
                    continue;
                };
                match locations
                    .iter()
                    .find(|location| location.name_any() == *default_name)
                {
                    Some(location) => {
                        provider_locations.insert(provider, Arc::clone(location));
                    }
                    None => errors.push(format!(
                        "default snapshot location {default_name} for provider {provider} \
                         does not exist"
                    )),
                }
            } else if let Some(location) = locations.pop() {
                provider_locations.insert(provider, location);
            }
        }

        if !errors.is_empty() {
            return (BTreeMap::new(), errors);
        }
        (provider_locations, errors)
    }

    /// Execute one backup run: idempotency check, item pipeline, artifact
    /// upload. The terminal phase and completion timestamp are stamped into
    /// the request before the metadata is serialized so the uploaded object
    /// already carries them.
    async fn run_backup(&self, request: &mut Request) -> Result<()> {
        let name = request.backup.name_any();

        let plugin_manager = (self.new_plugin_manager)();
        let _plugin_cleanup = PluginCleanup(Arc::clone(&plugin_manager));

        let actions = plugin_manager.get_backup_item_actions()?;

        let location = request
            .storage_location
            .clone()
            .ok_or_else(|| Error::storage("backup storage location was not resolved"))?;
        let backup_store = (self.new_backup_store)(&location)?;

        let bucket = location.spec.object_storage.bucket.clone();
        match backup_store.backup_exists(&bucket, &name).await {
            Ok(false) => {}
            Ok(true) => {
                return Err(Error::storage(format!(
                    "backup {name} already exists in object storage"
                )));
            }
            Err(check_error) => {
                return Err(Error::storage(format!(
                    "error checking if backup {name} already exists in object storage: \
                     {check_error}"
                )));
            }
        }

        let mut backup_file = Vec::new();
        self.backupper
            .backup(
                request,
                &mut backup_file,
                actions,
                Arc::clone(&plugin_manager),
            )
            .await?;

        let completion = self.clock.now();
        let status = status_mut(&mut request.backup);
        status.completion_timestamp = Some(completion);
        status.phase = Some(if status.errors > 0 {
            BackupPhase::PartiallyFailed
        } else {
            BackupPhase::Completed
        });

        let metadata = serde_json::to_vec_pretty(&request.backup)?;
        backup_store
            .put_backup(BackupInfo {
                name: name.clone(),
                metadata,
                contents: backup_file,
            })
            .await?;

        info!(backup = %name, "Backup completed");
        Ok(())
    }
}

/// Releases the plugin processes for one reconcile on every exit path
struct PluginCleanup(Arc<dyn PluginManager>);

impl Drop for PluginCleanup {
    fn drop(&mut self) {
        self.0.cleanup_clients();
    }
}

/// Split a `namespace/name` queue key
fn split_key(key: &str) -> Option<(&str, &str)> {
    let mut parts = key.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(namespace), Some(name), None) if !namespace.is_empty() && !name.is_empty() => {
            Some((namespace, name))
        }
        _ => None,
    }
}

/// First exclude that also appears in the includes list, rendered as the
/// user-visible complaint
fn validate_includes_excludes(includes: &[String], excludes: &[String]) -> Option<String> {
    excludes
        .iter()
        .find(|item| includes.contains(item))
        .map(|overlap| {
            format!("excludes list cannot contain an item in the includes list: {overlap}")
        })
}

/// Render a lookup miss the way the API server would
fn not_found_message(resource: &str, name: &str) -> String {
    format!("{resource}.velero.io \"{name}\" not found")
}

//! Cluster Backup Operator
//!
//! Main entry point for the operator. Sets up the Kubernetes client, the
//! resource caches, and the backup reconciler, then runs the controller loop.

use std::sync::Arc;

use kube::{Api, Client};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cluster_backup_operator::{
    backup::NoopBackupper,
    cache,
    clock::SystemClock,
    config::{LogFormat, OperatorConfig},
    controllers::{self, Context},
    crd::{Backup, BackupStorageLocation, VolumeSnapshotLocation},
    metrics,
    persistence::{BackupStore, FileSystemBackupStore},
    plugin::{NoopPluginManager, PluginManager},
    reconcilers::{BackupReconciler, KubeBackupApi},
    tracker::BackupTracker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OperatorConfig::from_env()?;
    init_tracing(config.log_format);

    info!("Starting cluster backup operator");

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    // Read-only caches standing in for informer/lister plumbing
    let backups = cache::spawn_cached_reflector(Api::<Backup>::all(client.clone()));
    let storage_locations =
        cache::spawn_cached_reflector(Api::<BackupStorageLocation>::all(client.clone()));
    let snapshot_locations =
        cache::spawn_cached_reflector(Api::<VolumeSnapshotLocation>::all(client.clone()));

    let tracker = Arc::new(BackupTracker::default());
    let store_root = config.backup_store_root.clone();

    let reconciler = Arc::new(BackupReconciler::new(
        Arc::new(backups),
        Arc::new(storage_locations),
        Arc::new(snapshot_locations),
        Arc::new(KubeBackupApi::new(client.clone())),
        Arc::new(NoopBackupper),
        Arc::new(|| Arc::new(NoopPluginManager) as Arc<dyn PluginManager>),
        Arc::new(move |location: &BackupStorageLocation| {
            Ok(Arc::new(FileSystemBackupStore::new(&store_root, location)) as Arc<dyn BackupStore>)
        }),
        Arc::clone(&tracker),
        Arc::new(SystemClock),
        config.defaults.clone(),
    ));

    let context = Arc::new(Context::new(client.clone(), reconciler));

    // Start metrics server
    let metrics_handle = tokio::spawn(metrics::serve(config.metrics_port));
    info!("Metrics server starting on port {}", config.metrics_port);

    let backup_controller = controllers::run_backup_controller(client.clone(), context);

    // Handle graceful shutdown
    tokio::select! {
        _ = backup_controller => {
            error!("Backup controller exited unexpectedly");
        }
        result = metrics_handle => {
            error!("Metrics server exited unexpectedly: {:?}", result);
        }
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Operator shutdown complete");
    Ok(())
}

/// Initialize tracing with the configured output format
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kube=warn"));

    match format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }
}

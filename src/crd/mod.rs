//! Custom Resource Definitions for the cluster backup operator

mod backup;
mod backup_storage_location;
mod schedule;
mod volume_snapshot_location;

pub use backup::*;
pub use backup_storage_location::*;
pub use schedule::*;
pub use volume_snapshot_location::*;

use kube::CustomResourceExt;

/// Generate all CRD YAML manifests
pub fn generate_crds() -> Vec<String> {
    vec![
        serde_yaml::to_string(&Backup::crd()).unwrap(),
        serde_yaml::to_string(&BackupStorageLocation::crd()).unwrap(),
        serde_yaml::to_string(&VolumeSnapshotLocation::crd()).unwrap(),
        serde_yaml::to_string(&Schedule::crd()).unwrap(),
    ]
}

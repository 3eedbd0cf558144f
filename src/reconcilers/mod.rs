//! Reconciliation logic
//!
//! This module contains the business logic driving each resource's phase
//! machine; the controllers module owns the watch loops that feed it.

pub mod backup;

pub use backup::{BackupApi, BackupReconciler, KubeBackupApi};

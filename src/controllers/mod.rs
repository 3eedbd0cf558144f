//! Kubernetes controllers
//!
//! This module contains the controller implementations that watch for
//! resource changes and trigger reconciliation.

mod backup_controller;

pub use backup_controller::run as run_backup_controller;

use std::sync::Arc;

use kube::Client;

use crate::reconcilers::BackupReconciler;

/// Shared context for the controllers
pub struct Context {
    /// Kubernetes client
    pub client: Client,

    /// The backup reconciliation core
    pub reconciler: Arc<BackupReconciler>,
}

impl Context {
    /// Create a new context
    pub fn new(client: Client, reconciler: Arc<BackupReconciler>) -> Self {
        Self { client, reconciler }
    }
}

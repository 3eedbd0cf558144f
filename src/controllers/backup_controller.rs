//! Backup controller
//!
//! Watches Backup resources and feeds their keys to the reconciler. The
//! controller runtime dedupes concurrent enqueues of the same key and runs
//! distinct keys in parallel, one reconcile per key at a time.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::{
    api::ListParams,
    runtime::{
        controller::{Action, Controller},
        watcher::Config as WatcherConfig,
    },
    Api, Client, ResourceExt,
};
use tracing::{debug, error, info, instrument};

use crate::controllers::Context;
use crate::crd::Backup;
use crate::error::{Error, Result};
use crate::metrics;

/// Run the Backup controller
pub async fn run(client: Client, context: Arc<Context>) {
    let api: Api<Backup> = Api::all(client.clone());

    // Verify CRD is installed
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        error!("Backup CRD not installed: {}", e);
        return;
    }

    info!("Starting Backup controller");

    Controller::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    debug!(
                        name = %obj.name,
                        namespace = obj.namespace.as_deref().unwrap_or("default"),
                        "Reconciled Backup"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation error");
                    metrics::RECONCILIATION_ERRORS
                        .with_label_values(&["Backup"])
                        .inc();
                }
            }
        })
        .await;
}

/// Main reconciliation function
#[instrument(skip(ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile(obj: Arc<Backup>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&["Backup"])
        .start_timer();
    metrics::RECONCILIATIONS.with_label_values(&["Backup"]).inc();

    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
    let key = format!("{}/{}", namespace, obj.name_any());

    // Only a failed status write comes back as an error; every other outcome
    // is already persisted on the Backup, so nothing is requeued for it.
    ctx.reconciler.process_backup(&key).await?;

    Ok(Action::await_change())
}

/// Error policy for the controller
fn error_policy(obj: Arc<Backup>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        name = %obj.name_any(),
        error = %error,
        "Reconciliation failed, scheduling retry"
    );

    let requeue_duration = match error {
        Error::Kube(_) => Duration::from_secs(30),
        _ => Duration::from_secs(60),
    };

    Action::requeue(requeue_duration)
}

//! Read-only indexed caches
//!
//! The reconciler never talks to the API server for reads; it consumes
//! in-memory caches kept warm by watch streams. The [`ResourceCache`] trait is
//! the seam: production wires kube reflector stores, tests substitute fixed
//! maps.

use std::fmt::Debug;
use std::sync::Arc;

use futures::StreamExt;
use kube::api::Api;
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::Resource;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Read access to a namespaced resource cache
pub trait ResourceCache<K>: Send + Sync {
    /// Fetch one object by namespace and name
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<K>>;

    /// All cached objects in a namespace
    fn list(&self, namespace: &str) -> Vec<Arc<K>>;
}

impl<K> ResourceCache<K> for Store<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<K>> {
        Store::get(self, &ObjectRef::new(name).within(namespace))
    }

    fn list(&self, namespace: &str) -> Vec<Arc<K>> {
        self.state()
            .into_iter()
            .filter(|obj| obj.meta().namespace.as_deref() == Some(namespace))
            .collect()
    }
}

/// Start a reflector for `api` and return its read handle.
///
/// The watch task runs until the process exits; transient watch errors are
/// logged and retried with the watcher's default backoff.
pub fn spawn_cached_reflector<K>(api: Api<K>) -> Store<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let (reader, writer) = reflector::store();
    let stream = reflector::reflector(writer, watcher(api, watcher::Config::default()));

    tokio::spawn(async move {
        let mut applied = std::pin::pin!(stream.applied_objects());
        while let Some(event) = applied.next().await {
            if let Err(error) = event {
                warn!(%error, "resource watch error");
            }
        }
    });

    reader
}

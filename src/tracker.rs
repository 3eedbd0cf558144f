//! In-flight backup tracking
//!
//! External observers (deletion handling, metrics) need to know which backups
//! are currently between the `InProgress` transition and their terminal
//! status write. The tracker is a concurrency-safe set of
//! `namespace/name` identifiers; callers hold an [`InFlightBackup`] guard so
//! removal happens on every exit path, panics included.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Concurrency-safe set of in-flight backup identifiers
#[derive(Debug, Default)]
pub struct BackupTracker {
    backups: Mutex<HashSet<String>>,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

impl BackupTracker {
    /// Record a backup as in-flight
    pub fn add(&self, namespace: &str, name: &str) {
        self.lock().insert(key(namespace, name));
    }

    /// Remove a backup from the in-flight set
    pub fn delete(&self, namespace: &str, name: &str) {
        self.lock().remove(&key(namespace, name));
    }

    /// Whether a backup is currently in-flight
    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.lock().contains(&key(namespace, name))
    }

    /// Number of in-flight backups
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no backups are in-flight
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Record a backup as in-flight and return a guard that removes it when
    /// dropped, covering error and panic exits alike.
    pub fn track(self: &Arc<Self>, namespace: &str, name: &str) -> InFlightBackup {
        self.add(namespace, name);
        InFlightBackup {
            tracker: Arc::clone(self),
            key: key(namespace, name),
        }
    }

    // The tracker must keep functioning after a panicked holder, so a
    // poisoned mutex is recovered rather than propagated.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.backups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Guard representing one in-flight backup
#[derive(Debug)]
pub struct InFlightBackup {
    tracker: Arc<BackupTracker>,
    key: String,
}

impl Drop for InFlightBackup {
    fn drop(&mut self) {
        self.tracker.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_contains_delete() {
        let tracker = BackupTracker::default();
        assert!(!tracker.contains("velero", "backup-1"));

        tracker.add("velero", "backup-1");
        assert!(tracker.contains("velero", "backup-1"));
        assert!(!tracker.contains("other", "backup-1"));
        assert_eq!(tracker.len(), 1);

        tracker.delete("velero", "backup-1");
        assert!(tracker.is_empty());
    }

    #[test]
    fn guard_removes_on_drop() {
        let tracker = Arc::new(BackupTracker::default());
        {
            let _guard = tracker.track("velero", "backup-1");
            assert!(tracker.contains("velero", "backup-1"));
        }
        assert!(tracker.is_empty());
    }

    #[test]
    fn guard_removes_on_panic() {
        let tracker = Arc::new(BackupTracker::default());
        let result = std::panic::catch_unwind({
            let tracker = Arc::clone(&tracker);
            move || {
                let _guard = tracker.track("velero", "backup-1");
                panic!("backup blew up");
            }
        });
        assert!(result.is_err());
        assert!(tracker.is_empty());
    }

    #[test]
    fn duplicate_adds_collapse() {
        let tracker = BackupTracker::default();
        tracker.add("velero", "backup-1");
        tracker.add("velero", "backup-1");
        assert_eq!(tracker.len(), 1);
    }
}

//! Write serialization for remote plugin documents.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use wicket_control_core::PluginKind;

/// Serializes fetch-merge-push cycles against a single plugin's remote
/// document.
///
/// The remote control plane offers no optimistic-concurrency token: two
/// overlapping read-modify-write sequences against the same plugin would
/// race, with the later fetch silently discarding the earlier push. Every
/// reconciliation path therefore holds the (cluster, plugin) lock for the
/// whole cycle.
#[derive(Debug, Default)]
pub struct PluginLocks {
    locks: DashMap<(String, PluginKind), Arc<Mutex<()>>>,
}

impl PluginLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the write lock for `(cluster, plugin)`, creating it on first use.
    pub async fn acquire(&self, cluster: &str, plugin: PluginKind) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry((cluster.to_string(), plugin))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

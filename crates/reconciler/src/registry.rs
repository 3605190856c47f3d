//! Per-cluster plugin inventory.

use std::collections::BTreeMap;

use wicket_control_core::PluginKind;

/// Explicit inventory of the plugins installed on one cluster's gateway,
/// mapping each kind to its backend-side plugin id.
///
/// Passed into the reconciler per configuration rather than kept as
/// process-wide mutable state, so two reconcilers for different clusters can
/// never observe each other's registrations.
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    cluster: String,
    plugins: BTreeMap<PluginKind, i64>,
}

impl PluginRegistry {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            plugins: BTreeMap::new(),
        }
    }

    pub fn with_plugin(mut self, kind: PluginKind, plugin_id: i64) -> Self {
        self.plugins.insert(kind, plugin_id);
        self
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn contains(&self, kind: PluginKind) -> bool {
        self.plugins.contains_key(&kind)
    }

    pub fn plugin_id(&self, kind: PluginKind) -> Option<i64> {
        self.plugins.get(&kind).copied()
    }

    /// Registered kinds in a stable order.
    pub fn kinds(&self) -> impl Iterator<Item = PluginKind> + '_ {
        self.plugins.keys().copied()
    }
}

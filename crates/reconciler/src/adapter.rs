//! Provider adapter contract.
//!
//! The reconciler depends on this capability set only, never on a concrete
//! backend. It is implemented once per backend family: the legacy proxy,
//! whose authorization is a flat comma-joined allow-list, and the managed
//! gateway, whose plugins are configured via structured YAML documents.
//! Adapter errors are propagated with context and never retried.

use async_trait::async_trait;

use wicket_control_core::{CredentialRecord, PluginKind, Result};

/// Which backend family an adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayProvider {
    Legacy,
    Managed,
}

/// Request to create a consumer object on the backend.
#[derive(Debug, Clone, Default)]
pub struct ConsumerRequest {
    /// Derived gateway-facing consumer name.
    pub username: String,
    /// Platform-side identifier echoed back by the backend.
    pub custom_id: String,
}

#[derive(Debug, Clone)]
pub struct ConsumerReply {
    /// Backend-assigned consumer identifier.
    pub id: String,
    pub custom_id: String,
    pub created_at: i64,
}

/// Credential material handed to the backend when issuing a credential.
/// Which fields are meaningful depends on the plugin kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialInit {
    pub key: String,
    pub secret: String,
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_urls: Vec<String>,
    pub username: String,
}

/// Scope a remote plugin configuration entry applies at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    Global,
    Domain,
    Route,
}

/// One entry of a plugin's remote configuration list. The reconciler only
/// ever writes the global-level entry; the others are carried for
/// completeness of the wire contract.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfigEntry {
    pub id: Option<i64>,
    pub config_level: ConfigLevel,
    pub enabled: bool,
    /// The plugin document, serialized as the backend stores it.
    pub config: String,
}

/// Capability set the reconciliation core requires from a gateway backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> GatewayProvider;

    async fn create_consumer(&self, req: &ConsumerRequest) -> Result<ConsumerReply>;

    async fn delete_consumer(&self, consumer_id: &str) -> Result<()>;

    /// Create the (initially empty) ACL group backing a consumer's grants.
    async fn create_acl_group(&self, consumer_id: &str, group_name: &str) -> Result<()>;

    /// Issue a credential; returns the material as the backend recorded it.
    /// Not every field round-trips on every backend, which is why the
    /// credential store is written independently.
    async fn create_credential(
        &self,
        plugin: PluginKind,
        consumer_id: &str,
        init: &CredentialInit,
    ) -> Result<CredentialInit>;

    async fn delete_credential(
        &self,
        consumer_id: &str,
        plugin: PluginKind,
        key: &str,
    ) -> Result<()>;

    async fn get_credential_list(
        &self,
        consumer_id: &str,
        plugin: PluginKind,
    ) -> Result<Vec<CredentialRecord>>;

    /// Whether the plugin is available on this backend. A disabled plugin is
    /// skipped by callers, never an error.
    async fn check_plugin_enabled(&self, plugin: PluginKind) -> Result<bool>;

    /// Fetch the plugin's remote configuration entries, one per config level.
    async fn get_plugin(&self, plugin: PluginKind) -> Result<Vec<PluginConfigEntry>>;

    /// Replace one configuration entry; returns the entry id and the number
    /// of affected configurations.
    async fn update_plugin(
        &self,
        plugin: PluginKind,
        entry: &PluginConfigEntry,
    ) -> Result<(i64, usize)>;
}

//! Stored credential records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::consumer::{Consumer, PluginKind};

/// A per-plugin secret bound to one consumer.
///
/// One superset row shape is reused across all plugin kinds; fields a kind
/// does not use stay empty. For the managed backend this record, not the
/// adapter's create-credential response, is the source of truth used to
/// reconstruct the consumer's gateway-side identity, because the remote API
/// does not round-trip every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: String,
    pub consumer_id: String,
    pub consumer_name: String,
    pub plugin: PluginKind,
    pub org_id: String,
    pub project_id: String,
    pub env: String,
    pub cluster: String,
    pub key: String,
    pub secret: String,
    pub issuer: String,
    pub jwks: String,
    /// Comma-joined request-parameter names a JWT may be extracted from.
    pub from_params: String,
    /// Comma-joined cookie names a JWT may be extracted from.
    pub from_cookies: String,
    /// `"N"` means the token is stripped before proxying; anything else keeps it.
    pub keep_token: String,
    pub clock_skew_seconds: String,
    pub redirect_url: String,
    pub redirect_urls: String,
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// An empty record bound to `consumer` for `plugin`, with scope and
    /// naming fields filled in and everything else at its zero value.
    pub fn new(consumer: &Consumer, plugin: PluginKind) -> Self {
        Self {
            id: String::new(),
            consumer_id: consumer.gateway_id.clone(),
            consumer_name: consumer.name.clone(),
            plugin,
            org_id: consumer.scope.org_id.clone(),
            project_id: consumer.scope.project_id.clone(),
            env: consumer.scope.env.clone(),
            cluster: consumer.scope.cluster.clone(),
            key: String::new(),
            secret: String::new(),
            issuer: String::new(),
            jwks: String::new(),
            from_params: String::new(),
            from_cookies: String::new(),
            keep_token: String::new(),
            clock_skew_seconds: String::new(),
            redirect_url: String::new(),
            redirect_urls: String::new(),
            name: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            username: String::new(),
            created_at: Utc::now(),
        }
    }
}

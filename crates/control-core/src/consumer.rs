//! Consumer identities and gateway plugin kinds.

use serde::{Deserialize, Serialize};

/// Tenant scoping for a consumer: organization, project, environment and the
/// cluster whose gateway serves that environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerScope {
    pub org_id: String,
    pub project_id: String,
    pub env: String,
    pub cluster: String,
}

impl ConsumerScope {
    pub fn new(
        org_id: impl Into<String>,
        project_id: impl Into<String>,
        env: impl Into<String>,
        cluster: impl Into<String>,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            project_id: project_id.into(),
            env: env.into(),
            cluster: cluster.into(),
        }
    }

    /// Name of the auto-created default consumer for this scope.
    ///
    /// The default consumer exists so every environment has at least one
    /// grantable identity; user-facing listings filter it out via
    /// [`ConsumerScope::is_default_consumer`].
    pub fn default_consumer_name(&self) -> String {
        format!("default_{}_{}_{}", self.project_id, self.env, self.cluster)
    }

    /// Whether `name` is this scope's default consumer.
    pub fn is_default_consumer(&self, name: &str) -> bool {
        name.to_lowercase()
            .ends_with(&self.default_consumer_name().to_lowercase())
    }
}

/// Whether a consumer is an ordinary platform identity or a client
/// application bringing its own key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerKind {
    Platform,
    ClientApp,
}

/// An API client identity known to the platform.
///
/// `id` is the platform-side identifier; `gateway_id` is the identifier the
/// gateway backend assigned when the consumer was created remotely.
/// Credentials are keyed by `gateway_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumer {
    pub id: String,
    pub gateway_id: String,
    pub scope: ConsumerScope,
    pub name: String,
    pub kind: ConsumerKind,
    pub description: String,
}

impl Consumer {
    /// Backend-facing consumer name, derived deterministically from the scope.
    ///
    /// Doubles as the uniqueness key inside managed-gateway plugin
    /// configuration. A consumer without project scoping keeps its bare
    /// display name.
    pub fn gateway_name(&self) -> String {
        if self.scope.project_id.is_empty() {
            return self.name.clone();
        }
        format!(
            "{}.{}.{}.{}:{}",
            self.scope.org_id, self.scope.project_id, self.scope.env, self.scope.cluster, self.name
        )
    }
}

/// A named gateway capability configured via a structured document.
///
/// String forms are the remote plugin names and appear verbatim in adapter
/// calls and stored credential rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PluginKind {
    #[serde(rename = "key-auth")]
    KeyAuth,
    #[serde(rename = "hmac-auth")]
    HmacAuth,
    #[serde(rename = "para-sign-auth")]
    ParamSignAuth,
    #[serde(rename = "oauth2")]
    OAuth2,
    #[serde(rename = "sign-auth")]
    SignAuth,
    #[serde(rename = "csrf-token")]
    Csrf,
    #[serde(rename = "ip-access")]
    IpAcl,
    #[serde(rename = "sbac")]
    Sbac,
    #[serde(rename = "jwt-auth")]
    JwtAuth,
    #[serde(rename = "basic-auth")]
    BasicAuth,
}

impl PluginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::KeyAuth => "key-auth",
            PluginKind::HmacAuth => "hmac-auth",
            PluginKind::ParamSignAuth => "para-sign-auth",
            PluginKind::OAuth2 => "oauth2",
            PluginKind::SignAuth => "sign-auth",
            PluginKind::Csrf => "csrf-token",
            PluginKind::IpAcl => "ip-access",
            PluginKind::Sbac => "sbac",
            PluginKind::JwtAuth => "jwt-auth",
            PluginKind::BasicAuth => "basic-auth",
        }
    }

    /// Plugins whose configuration embeds per-consumer grants and therefore
    /// must be rewritten when a consumer is deleted.
    pub fn supports_acl_cleanup(&self) -> bool {
        matches!(
            self,
            PluginKind::KeyAuth | PluginKind::HmacAuth | PluginKind::ParamSignAuth
        )
    }
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PluginKind {
    type Err = crate::ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key-auth" => Ok(PluginKind::KeyAuth),
            "hmac-auth" => Ok(PluginKind::HmacAuth),
            "para-sign-auth" => Ok(PluginKind::ParamSignAuth),
            "oauth2" => Ok(PluginKind::OAuth2),
            "sign-auth" => Ok(PluginKind::SignAuth),
            "csrf-token" => Ok(PluginKind::Csrf),
            "ip-access" => Ok(PluginKind::IpAcl),
            "sbac" => Ok(PluginKind::Sbac),
            "jwt-auth" => Ok(PluginKind::JwtAuth),
            "basic-auth" => Ok(PluginKind::BasicAuth),
            other => Err(crate::ControlError::Other(format!(
                "unknown plugin kind: {other}"
            ))),
        }
    }
}

//! Wire documents for the managed gateway's plugin configuration.
//!
//! Field and tag names below (`consumers`, `keys`, `in_query`, `in_header`,
//! `_rules_`, `_match_route_`, `allow`, ...) are fixed by the remote
//! gateway's plugin schema and must be reproduced exactly for
//! interoperability. Do not rename them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::credential::CredentialRecord;
use crate::{consumer::PluginKind, Result};

/// Default clock skew granted to JWT validation when the stored credential
/// does not carry one.
pub const JWT_DEFAULT_CLOCK_SKEW_SECONDS: i64 = 60;

/// One entry of a plugin document's `consumers` list: the consumer's derived
/// name plus the secret material of exactly one credential per relevant kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_params: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_cookies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_token: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock_skew_seconds: Option<i64>,
}

impl ConsumerEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Fold one stored credential into this entry, field by field.
    ///
    /// Selects the projection the plugin kind calls for: key-auth fills
    /// `credential`, hmac-auth and para-sign-auth fill `key`/`secret`,
    /// basic-auth fills `credential`, JWT fills the claim-extraction fields
    /// with their documented defaults. OAuth2 material is not representable
    /// in managed-gateway consumer entries and is skipped.
    pub fn apply_credential(&mut self, record: &CredentialRecord) {
        match record.plugin {
            PluginKind::KeyAuth => {
                self.credential = Some(record.key.clone());
            }
            PluginKind::HmacAuth | PluginKind::ParamSignAuth | PluginKind::SignAuth => {
                self.key = Some(record.key.clone());
                self.secret = Some(record.secret.clone());
            }
            PluginKind::BasicAuth => {
                self.credential = Some(record.key.clone());
            }
            PluginKind::JwtAuth => {
                if !record.from_params.is_empty() {
                    self.from_params =
                        Some(record.from_params.split(',').map(str::to_string).collect());
                }
                if !record.from_cookies.is_empty() {
                    self.from_cookies = Some(
                        record
                            .from_cookies
                            .split(',')
                            .map(str::to_string)
                            .collect(),
                    );
                }
                // "N" is the only stored value that turns token passthrough off.
                self.keep_token = Some(record.keep_token != "N");
                let mut skew = JWT_DEFAULT_CLOCK_SKEW_SECONDS;
                if let Ok(stored) = record.clock_skew_seconds.parse::<i64>() {
                    if stored > 0 {
                        skew = stored;
                    }
                }
                self.clock_skew_seconds = Some(skew);
            }
            PluginKind::OAuth2 | PluginKind::Csrf | PluginKind::IpAcl | PluginKind::Sbac => {}
        }
    }
}

/// One allow-list rule: the routes it matches and the consumer names allowed
/// through them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AclRule {
    #[serde(rename = "_match_route_")]
    pub match_route: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<String>,
}

/// Plugin document for the consumer-allow-list family (key-auth, hmac-auth).
///
/// `keys`/`in_query`/`in_header` are key-auth specific and absent from
/// hmac-auth documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerAclDocument {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumers: Vec<ConsumerEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_query: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_header: Option<bool>,
    #[serde(default, rename = "_rules_", skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<AclRule>,
}

/// One parameter-signature rule: the route, its embedded consumer list and
/// the request-validation knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSignRule {
    #[serde(rename = "_match_route_")]
    pub match_route: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumers: Vec<ConsumerEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body_size_limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_offset: Option<i64>,
}

/// Plugin document for parameter-signature-auth. There is no global consumer
/// list; every rule embeds its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSignDocument {
    #[serde(default, rename = "_rules_", skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ParamSignRule>,
}

/// Per-route CSRF protection settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsrfRule {
    #[serde(rename = "_match_route_")]
    pub match_route: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_cookie: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_method: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_cookie: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_domain: String,
    #[serde(default)]
    pub cookie_secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_status: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub err_msg: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsrfDocument {
    #[serde(default, rename = "_rules_", skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<CsrfRule>,
}

/// Per-route IP access-control settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpRule {
    #[serde(rename = "_match_route_")]
    pub match_route: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_acl_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_acl_list: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpAclDocument {
    #[serde(default, rename = "_rules_", skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<IpRule>,
}

/// Per-route policy-based access-control settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SbacRule {
    #[serde(rename = "_match_route_")]
    pub match_route: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_control_api: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub with_headers: Vec<String>,
    #[serde(default)]
    pub with_cookie: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SbacDocument {
    #[serde(default, rename = "_rules_", skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<SbacRule>,
}

/// Parse a fetched plugin document. A parse failure aborts the whole
/// operation before any merge runs, so the remote state is left untouched.
pub fn from_yaml<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_yaml::from_str(text)?)
}

/// Serialize a plugin document for pushing. Callers are expected to have
/// ordered rules and consumers deterministically (the merge engine does).
pub fn to_yaml<T: Serialize>(doc: &T) -> Result<String> {
    Ok(serde_yaml::to_string(doc)?)
}

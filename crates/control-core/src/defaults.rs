//! Placeholder identities and per-plugin bootstrap configuration.
//!
//! The managed gateway interprets a plugin document with an empty `_rules_`
//! list as "apply to every route", which is a global policy. The placeholder route
//! and consumer below are injected whenever a merge would otherwise produce
//! an empty document so that can never happen. Every merge function shares
//! these constants; they are defined once and only here.

use crate::consumer::PluginKind;
use crate::wire::{
    ConsumerAclDocument, ConsumerEntry, CsrfRule, IpRule, ParamSignDocument, ParamSignRule,
    SbacRule,
};

/// Sentinel route present in every plugin document.
pub const DEFAULT_ROUTE_NAME: &str = "route-wicket-default";

/// Sentinel consumer present in every plugin document. Assumed never to be a
/// legitimate consumer name; the merge engine prunes non-default routes whose
/// allow-list contains nothing else.
pub const DEFAULT_CONSUMER_NAME: &str = "consumer-wicket-default";

/// Fixed credential material for the sentinel consumer. Doubles as key and
/// secret where a plugin wants a pair.
pub const DEFAULT_CONSUMER_CREDENTIAL: &str = "7f3f2c1a-52e4-4b0e-9d36-b4a7c09d6f21";

/// Header/query parameter names the key-auth plugin reads the key from.
pub const KEY_AUTH_DEFAULT_KEYS: &[&str] = &["appKey", "x-app-key"];

/// Body-size limit stamped onto builder-issued parameter-signature rules.
pub const PARAM_SIGN_BODY_LIMIT: i64 = 33_554_432;

/// Permitted request-date skew (seconds) on builder-issued rules.
pub const PARAM_SIGN_DATE_OFFSET: i64 = 300;

/// Knobs of the bootstrap parameter-signature rule.
pub const PARAM_SIGN_BOOTSTRAP_BODY_LIMIT: i64 = 10_485_760;
pub const PARAM_SIGN_BOOTSTRAP_DATE_OFFSET: i64 = 600;

/// CSRF default settings used for the placeholder rule.
pub const CSRF_DEFAULT_USER_COOKIE: &str = "uid-token";
pub const CSRF_DEFAULT_EXCLUDED_METHODS: &[&str] = &["GET", "HEAD", "OPTIONS", "TRACE"];
pub const CSRF_DEFAULT_TOKEN_COOKIE: &str = "csrf-token";
pub const CSRF_DEFAULT_VALID_TTL: i64 = 1800;
pub const CSRF_DEFAULT_REFRESH_TTL: i64 = 300;
pub const CSRF_DEFAULT_ERR_STATUS: i64 = 403;
pub const CSRF_DEFAULT_ERR_MSG: &str = r#"{"message":"CSRF token invalid or expired"}"#;

/// IP access-control default settings: whitelist mode keyed off the
/// `x-real-ip` header, with a fixed bootstrap CIDR list.
pub const IP_ACL_DEFAULT_SOURCE: &str = "x-real-ip";
pub const IP_ACL_TYPE_WHITE: &str = "white";
pub const IP_ACL_TYPE_BLACK: &str = "black";
pub const IP_ACL_DEFAULT_LIST: &[&str] = &["1.1.1.1/32"];

/// Policy-based access-control defaults.
pub const SBAC_DEFAULT_ACCESS_CONTROL_API: &str =
    "http://wicket-sbac.default.svc.cluster.local:8080/api/access-control";
pub const SBAC_DEFAULT_MATCH_PATTERN: &str = "/**";
pub const SBAC_DEFAULT_WITH_HEADER: &str = "Authorization";
pub const SBAC_ALL_HTTP_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "CONNECT", "OPTIONS", "TRACE",
];

/// The sentinel consumer entry with the credential material `plugin` expects.
pub fn default_consumer_entry(plugin: PluginKind) -> ConsumerEntry {
    let mut entry = ConsumerEntry::named(DEFAULT_CONSUMER_NAME);
    match plugin {
        PluginKind::KeyAuth | PluginKind::BasicAuth => {
            entry.credential = Some(DEFAULT_CONSUMER_CREDENTIAL.to_string());
        }
        PluginKind::HmacAuth | PluginKind::ParamSignAuth | PluginKind::SignAuth => {
            entry.key = Some(DEFAULT_CONSUMER_CREDENTIAL.to_string());
            entry.secret = Some(DEFAULT_CONSUMER_CREDENTIAL.to_string());
        }
        _ => {}
    }
    entry
}

/// Bootstrap key-auth document: sentinel consumer and route only.
pub fn key_auth_bootstrap() -> ConsumerAclDocument {
    ConsumerAclDocument {
        consumers: vec![default_consumer_entry(PluginKind::KeyAuth)],
        keys: Some(KEY_AUTH_DEFAULT_KEYS.iter().map(|k| k.to_string()).collect()),
        in_query: Some(true),
        in_header: Some(true),
        rules: vec![crate::wire::AclRule {
            match_route: vec![DEFAULT_ROUTE_NAME.to_string()],
            allow: vec![DEFAULT_CONSUMER_NAME.to_string()],
        }],
    }
}

/// Bootstrap hmac-auth document.
pub fn hmac_auth_bootstrap() -> ConsumerAclDocument {
    ConsumerAclDocument {
        consumers: vec![default_consumer_entry(PluginKind::HmacAuth)],
        rules: vec![crate::wire::AclRule {
            match_route: vec![DEFAULT_ROUTE_NAME.to_string()],
            allow: vec![DEFAULT_CONSUMER_NAME.to_string()],
        }],
        ..ConsumerAclDocument::default()
    }
}

/// Bootstrap parameter-signature document.
pub fn param_sign_bootstrap() -> ParamSignDocument {
    ParamSignDocument {
        rules: vec![param_sign_default_rule(DEFAULT_ROUTE_NAME)],
    }
}

pub fn param_sign_default_rule(route: &str) -> ParamSignRule {
    ParamSignRule {
        match_route: vec![route.to_string()],
        consumers: vec![default_consumer_entry(PluginKind::ParamSignAuth)],
        request_body_size_limit: Some(PARAM_SIGN_BOOTSTRAP_BODY_LIMIT),
        date_offset: Some(PARAM_SIGN_BOOTSTRAP_DATE_OFFSET),
    }
}

pub fn csrf_default_rule(route: &str) -> CsrfRule {
    CsrfRule {
        match_route: vec![route.to_string()],
        user_cookie: vec![CSRF_DEFAULT_USER_COOKIE.to_string()],
        excluded_method: CSRF_DEFAULT_EXCLUDED_METHODS
            .iter()
            .map(|m| m.to_string())
            .collect(),
        token_cookie: CSRF_DEFAULT_TOKEN_COOKIE.to_string(),
        token_domain: String::new(),
        cookie_secure: false,
        valid_ttl: Some(CSRF_DEFAULT_VALID_TTL),
        refresh_ttl: Some(CSRF_DEFAULT_REFRESH_TTL),
        err_status: Some(CSRF_DEFAULT_ERR_STATUS),
        err_msg: CSRF_DEFAULT_ERR_MSG.to_string(),
        jwt_secret: DEFAULT_CONSUMER_CREDENTIAL.to_string(),
    }
}

pub fn ip_acl_default_rule(route: &str) -> IpRule {
    IpRule {
        match_route: vec![route.to_string()],
        ip_source: IP_ACL_DEFAULT_SOURCE.to_string(),
        ip_acl_type: IP_ACL_TYPE_WHITE.to_string(),
        ip_acl_list: IP_ACL_DEFAULT_LIST.iter().map(|c| c.to_string()).collect(),
    }
}

pub fn sbac_default_rule(route: &str) -> SbacRule {
    SbacRule {
        match_route: vec![route.to_string()],
        access_control_api: SBAC_DEFAULT_ACCESS_CONTROL_API.to_string(),
        http_methods: SBAC_ALL_HTTP_METHODS.iter().map(|m| m.to_string()).collect(),
        match_patterns: vec![SBAC_DEFAULT_MATCH_PATTERN.to_string()],
        with_headers: vec![SBAC_DEFAULT_WITH_HEADER.to_string()],
        with_cookie: false,
    }
}

/// The YAML document pushed to enable a plugin that has never been
/// configured, so a config id exists for subsequent updates. Only plugins
/// the reconciler bootstraps this way are listed.
pub fn bootstrap_document(plugin: PluginKind) -> Option<String> {
    let doc = match plugin {
        PluginKind::KeyAuth => crate::wire::to_yaml(&key_auth_bootstrap()),
        PluginKind::HmacAuth => crate::wire::to_yaml(&hmac_auth_bootstrap()),
        PluginKind::ParamSignAuth => crate::wire::to_yaml(&param_sign_bootstrap()),
        PluginKind::IpAcl => crate::wire::to_yaml(&crate::wire::IpAclDocument {
            rules: vec![ip_acl_default_rule(DEFAULT_ROUTE_NAME)],
        }),
        _ => return None,
    };
    // Serializing a fully-owned in-memory document cannot fail.
    doc.ok()
}

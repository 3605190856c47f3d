//! ACL / route-grant rendering and plugin-config reconciliation.
//!
//! Converts the set of consumers granted to a package or route into the
//! active backend's authorization representation, then, for the managed
//! backend, folds it through the merge engine against the currently
//! deployed plugin document and pushes the result back.

use std::collections::BTreeSet;

use tracing::debug;

use wicket_control_core::defaults::{
    default_consumer_entry, DEFAULT_CONSUMER_NAME, DEFAULT_ROUTE_NAME, PARAM_SIGN_BODY_LIMIT,
    PARAM_SIGN_DATE_OFFSET,
};
use wicket_control_core::merge::{csrf, hmac_auth, ip_acl, key_auth, param_sign, sbac};
use wicket_control_core::wire::{
    from_yaml, to_yaml, AclRule, ConsumerAclDocument, ConsumerEntry, CsrfDocument, CsrfRule,
    IpAclDocument, IpRule, ParamSignDocument, ParamSignRule, SbacDocument, SbacRule,
};
use wicket_control_core::{defaults, Consumer, ControlError, PluginKind, Result};
use wicket_credential_store::CredentialStore;

use crate::adapter::{ConfigLevel, GatewayProvider, PluginConfigEntry, ProviderAdapter};
use crate::lifecycle::PolicyReconciler;

/// Wire value the legacy backend expects for an allow-list with no members;
/// its format disallows a truly empty whitelist value.
pub const LEGACY_EMPTY_ALLOW_LIST: &str = ",";

/// Rendered authorization for one backend family.
#[derive(Debug, Clone, PartialEq)]
pub enum AllowList {
    /// Comma-joined consumer names for the legacy proxy.
    Legacy(String),
    /// Per-consumer entries for the managed gateway's plugin documents.
    Managed(Vec<ConsumerEntry>),
}

/// Per-route policy settings for the scalar-settings plugin family.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutePolicy {
    Csrf(CsrfRule),
    IpAcl(IpRule),
    Sbac(SbacRule),
}

impl RoutePolicy {
    pub fn plugin(&self) -> PluginKind {
        match self {
            RoutePolicy::Csrf(_) => PluginKind::Csrf,
            RoutePolicy::IpAcl(_) => PluginKind::IpAcl,
            RoutePolicy::Sbac(_) => PluginKind::Sbac,
        }
    }
}

/// Comma-joined derived consumer names for the legacy backend.
pub fn render_legacy_allow_list(consumers: &[Consumer]) -> String {
    let joined = consumers
        .iter()
        .map(Consumer::gateway_name)
        .collect::<Vec<_>>()
        .join(",");
    if joined.is_empty() {
        LEGACY_EMPTY_ALLOW_LIST.to_string()
    } else {
        joined
    }
}

impl<A: ProviderAdapter, S: CredentialStore> PolicyReconciler<A, S> {
    /// Render a consumer set in the active backend's wire shape.
    pub fn render_allow_list(&self, consumers: &[Consumer]) -> Result<AllowList> {
        match self.adapter.provider() {
            GatewayProvider::Legacy => Ok(AllowList::Legacy(render_legacy_allow_list(consumers))),
            GatewayProvider::Managed => Ok(AllowList::Managed(
                self.render_managed_allow_list(consumers)?,
            )),
        }
    }

    /// Per-consumer entries for the managed gateway, populated from the
    /// credential store.
    ///
    /// Exactly one credential per relevant plugin kind is projected; the
    /// first stored one wins. An empty consumer set renders the placeholder
    /// consumer so downstream merges keep the non-empty invariant.
    pub fn render_managed_allow_list(&self, consumers: &[Consumer]) -> Result<Vec<ConsumerEntry>> {
        let mut entries = Vec::with_capacity(consumers.len());
        for consumer in consumers {
            let mut entry = ConsumerEntry::named(consumer.gateway_name());
            let credentials = self.store.list_by_consumer(&consumer.gateway_id)?;
            if credentials.is_empty() {
                return Err(ControlError::MissingCredential(consumer.name.clone()));
            }
            let mut seen = BTreeSet::new();
            for record in &credentials {
                if !seen.insert(record.plugin) {
                    continue;
                }
                entry.apply_credential(record);
            }
            entries.push(entry);
        }
        if entries.is_empty() {
            entries.push(ConsumerEntry::named(DEFAULT_CONSUMER_NAME));
        }
        Ok(entries)
    }

    /// Grant `consumers` access to `route` under one allow-list-style plugin
    /// (key-auth, hmac-auth or para-sign-auth) on the managed backend.
    ///
    /// Fetches the plugin's current global configuration, merges the grant
    /// in, and pushes the result, all under the (cluster, plugin) write
    /// lock. Passing the full consumer set makes the call authoritative for
    /// the route: consumers absent from `consumers` lose their grant.
    pub async fn apply_consumer_grant(
        &self,
        plugin: PluginKind,
        route: &str,
        consumers: &[Consumer],
    ) -> Result<()> {
        if self.adapter.provider() != GatewayProvider::Managed {
            return Err(ControlError::Other(
                "consumer grants reconcile through plugin documents only on the managed backend"
                    .to_string(),
            ));
        }
        let entries = self.render_managed_allow_list(consumers)?;

        let _guard = self.locks.acquire(self.registry.cluster(), plugin).await;
        let Some(mut entry) = self.fetch_global_entry(plugin).await? else {
            debug!(%plugin, route, "plugin unavailable, grant skipped");
            return Ok(());
        };

        let next_config = match plugin {
            PluginKind::KeyAuth => {
                let current: ConsumerAclDocument = from_yaml(&entry.config)?;
                let update = consumer_acl_update(plugin, route, entries);
                to_yaml(&key_auth::merge(&current, &update)?)?
            }
            PluginKind::HmacAuth => {
                let current: ConsumerAclDocument = from_yaml(&entry.config)?;
                let update = consumer_acl_update(plugin, route, entries);
                to_yaml(&hmac_auth::merge(&current, &update)?)?
            }
            PluginKind::ParamSignAuth => {
                let current: ParamSignDocument = from_yaml(&entry.config)?;
                let update = param_sign_update(route, entries);
                to_yaml(&param_sign::merge(&current, &update, false))?
            }
            other => {
                return Err(ControlError::Other(format!(
                    "plugin {other} does not carry consumer allow-lists"
                )))
            }
        };

        entry.config = next_config;
        entry.enabled = true;
        self.push_global_entry(plugin, &entry).await?;
        debug!(%plugin, route, consumers = consumers.len(), "applied consumer grant");
        Ok(())
    }

    /// Apply (or with `disable`, remove) one route's policy settings for a
    /// scalar-settings plugin (CSRF, IP access-control, SBAC).
    pub async fn apply_route_policy(
        &self,
        route: &str,
        policy: RoutePolicy,
        disable: bool,
    ) -> Result<()> {
        if self.adapter.provider() != GatewayProvider::Managed {
            return Err(ControlError::Other(
                "route policies reconcile through plugin documents only on the managed backend"
                    .to_string(),
            ));
        }
        let plugin = policy.plugin();
        let _guard = self.locks.acquire(self.registry.cluster(), plugin).await;
        let Some(mut entry) = self.fetch_global_entry(plugin).await? else {
            debug!(%plugin, route, "plugin unavailable, policy skipped");
            return Ok(());
        };

        let next_config = match policy {
            RoutePolicy::Csrf(mut rule) => {
                rule.match_route = vec![route.to_string()];
                let current: CsrfDocument = from_yaml(&entry.config)?;
                let update = CsrfDocument { rules: vec![rule] };
                to_yaml(&csrf::merge(&current, &update, disable))?
            }
            RoutePolicy::IpAcl(mut rule) => {
                rule.match_route = vec![route.to_string()];
                let current: IpAclDocument = from_yaml(&entry.config)?;
                let update = IpAclDocument { rules: vec![rule] };
                to_yaml(&ip_acl::merge(&current, &update, disable))?
            }
            RoutePolicy::Sbac(mut rule) => {
                rule.match_route = vec![route.to_string()];
                let current: SbacDocument = from_yaml(&entry.config)?;
                let update = SbacDocument { rules: vec![rule] };
                to_yaml(&sbac::merge(&current, &update, disable))?
            }
        };

        entry.config = next_config;
        entry.enabled = true;
        self.push_global_entry(plugin, &entry).await?;
        debug!(%plugin, route, disable, "applied route policy");
        Ok(())
    }

    /// The plugin's global-level configuration entry, or `None` when the
    /// plugin is unregistered or disabled on this backend (both are skips,
    /// not errors).
    ///
    /// A registered plugin whose global entry exists but is switched off has
    /// no usable configuration id yet; the bootstrap document is pushed to
    /// enable it, then the entry is re-read.
    pub(crate) async fn fetch_global_entry(
        &self,
        plugin: PluginKind,
    ) -> Result<Option<PluginConfigEntry>> {
        if !self.registry.contains(plugin) {
            debug!(%plugin, "plugin not registered on this cluster, skipping");
            return Ok(None);
        }
        if !self.adapter.check_plugin_enabled(plugin).await? {
            debug!(%plugin, "plugin not enabled, skipping");
            return Ok(None);
        }

        let entries = self.adapter.get_plugin(plugin).await?;
        let global = entries
            .into_iter()
            .find(|e| e.config_level == ConfigLevel::Global)
            .ok_or_else(|| {
                ControlError::Provider(format!(
                    "no global-level configuration entry for plugin {plugin}"
                ))
            })?;

        if global.enabled {
            return Ok(Some(global));
        }

        let Some(bootstrap) = defaults::bootstrap_document(plugin) else {
            return Ok(Some(global));
        };
        debug!(%plugin, "enabling plugin with bootstrap configuration");
        let seed = PluginConfigEntry {
            id: global.id,
            config_level: ConfigLevel::Global,
            enabled: true,
            config: bootstrap,
        };
        self.adapter.update_plugin(plugin, &seed).await?;

        let refreshed = self
            .adapter
            .get_plugin(plugin)
            .await?
            .into_iter()
            .find(|e| e.config_level == ConfigLevel::Global)
            .ok_or_else(|| {
                ControlError::Provider(format!(
                    "no global-level configuration entry for plugin {plugin} after enabling"
                ))
            })?;
        Ok(Some(refreshed))
    }

    pub(crate) async fn push_global_entry(
        &self,
        plugin: PluginKind,
        entry: &PluginConfigEntry,
    ) -> Result<(i64, usize)> {
        self.adapter.update_plugin(plugin, entry).await
    }
}

/// Build the allow-list update document for one grant, in the shape the
/// merge engine consumes: a single rule naming the route and every granted
/// consumer. When the set is the placeholder consumer only (no real grant),
/// it gets the placeholder credential material and the placeholder route is
/// pulled into the match list so the merge can recognize a revocation.
fn consumer_acl_update(
    plugin: PluginKind,
    route: &str,
    mut entries: Vec<ConsumerEntry>,
) -> ConsumerAclDocument {
    let mut match_routes = Vec::new();
    let mut allow = Vec::new();
    for entry in &mut entries {
        if entry.name == DEFAULT_CONSUMER_NAME {
            let placeholder = default_consumer_entry(plugin);
            entry.credential = placeholder.credential;
            entry.key = placeholder.key;
            entry.secret = placeholder.secret;
            match_routes.push(DEFAULT_ROUTE_NAME.to_string());
        }
        allow.push(entry.name.clone());
    }
    match_routes.push(route.to_string());

    ConsumerAclDocument {
        consumers: entries,
        rules: vec![AclRule {
            match_route: match_routes,
            allow,
        }],
        ..ConsumerAclDocument::default()
    }
}

fn param_sign_update(route: &str, mut entries: Vec<ConsumerEntry>) -> ParamSignDocument {
    let mut match_routes = Vec::new();
    for entry in &mut entries {
        if entry.name == DEFAULT_CONSUMER_NAME {
            let placeholder = default_consumer_entry(PluginKind::ParamSignAuth);
            entry.key = placeholder.key;
            entry.secret = placeholder.secret;
            match_routes.push(DEFAULT_ROUTE_NAME.to_string());
        }
    }
    match_routes.push(route.to_string());

    ParamSignDocument {
        rules: vec![ParamSignRule {
            match_route: match_routes,
            consumers: entries,
            request_body_size_limit: Some(PARAM_SIGN_BODY_LIMIT),
            date_offset: Some(PARAM_SIGN_DATE_OFFSET),
        }],
    }
}

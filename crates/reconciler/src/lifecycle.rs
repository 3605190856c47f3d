//! Consumer and credential lifecycle.
//!
//! Creates consumers on the active backend, issues their credential bundle,
//! and performs cascading deletion: plugin-config cleanup, stored credential
//! removal, then the remote consumer object itself. Cleanup only ever
//! removes grants, so a partial failure leaves a benign state the caller
//! retries to completion; nothing is rolled back.

use rand::RngCore;
use tracing::{debug, info};
use uuid::Uuid;

use wicket_control_core::merge::{hmac_auth, key_auth, param_sign};
use wicket_control_core::wire::{from_yaml, to_yaml};
use wicket_control_core::{
    Consumer, ConsumerKind, ConsumerScope, CredentialRecord, PluginKind, Result,
};
use wicket_credential_store::CredentialStore;

use crate::adapter::{
    ConsumerRequest, CredentialInit, GatewayProvider, ProviderAdapter,
};
use crate::locks::PluginLocks;
use crate::registry::PluginRegistry;

/// A consumer's credentials grouped by authentication scheme.
#[derive(Debug, Clone, Default)]
pub struct CredentialBundle {
    pub key_auth: Vec<CredentialRecord>,
    pub oauth2: Vec<CredentialRecord>,
    pub sign_auth: Vec<CredentialRecord>,
    pub hmac_auth: Vec<CredentialRecord>,
}

/// Orchestrates consumer lifecycle and plugin-config reconciliation against
/// one cluster's gateway backend.
///
/// Holds the provider adapter, the credential store, the cluster's plugin
/// registry and the per-(cluster, plugin) write locks. All remote writes to
/// a plugin's configuration go through [`PluginLocks`], so overlapping
/// grant/revoke operations on the same plugin cannot lose updates.
pub struct PolicyReconciler<A, S> {
    pub(crate) adapter: A,
    pub(crate) store: S,
    pub(crate) registry: PluginRegistry,
    pub(crate) locks: PluginLocks,
}

impl<A: ProviderAdapter, S: CredentialStore> PolicyReconciler<A, S> {
    pub fn new(adapter: A, store: S, registry: PluginRegistry) -> Self {
        Self {
            adapter,
            store,
            registry,
            locks: PluginLocks::new(),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Create a platform consumer with a freshly generated key/secret pair
    /// and the full credential bundle.
    pub async fn create_consumer(
        &self,
        scope: ConsumerScope,
        name: &str,
        description: &str,
    ) -> Result<Consumer> {
        let key = generate_secret();
        let secret = generate_secret();
        self.create_consumer_with_material(
            scope,
            name,
            description,
            ConsumerKind::Platform,
            key,
            secret,
        )
        .await
    }

    /// Create a client-application consumer. Client applications bring their
    /// own identity, so the key/secret pair is caller-supplied instead of
    /// generated.
    pub async fn create_client_consumer(
        &self,
        scope: ConsumerScope,
        name: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Consumer> {
        self.create_consumer_with_material(
            scope,
            name,
            "",
            ConsumerKind::ClientApp,
            client_id.to_string(),
            client_secret.to_string(),
        )
        .await
    }

    async fn create_consumer_with_material(
        &self,
        scope: ConsumerScope,
        name: &str,
        description: &str,
        kind: ConsumerKind,
        key: String,
        secret: String,
    ) -> Result<Consumer> {
        let custom_id = Uuid::new_v4().to_string();
        let mut consumer = Consumer {
            id: custom_id.clone(),
            gateway_id: String::new(),
            scope,
            name: name.to_string(),
            kind,
            description: description.to_string(),
        };
        let gateway_name = consumer.gateway_name();

        let reply = self
            .adapter
            .create_consumer(&ConsumerRequest {
                username: gateway_name.clone(),
                custom_id,
            })
            .await?;
        consumer.gateway_id = reply.id;

        self.adapter
            .create_acl_group(&consumer.gateway_id, &gateway_name)
            .await?;

        // One key/secret pair backs the whole bundle: the key doubles as the
        // OAuth2 client id, the secret as its client secret.
        self.issue_credential(
            &consumer,
            PluginKind::KeyAuth,
            CredentialInit {
                key: key.clone(),
                ..CredentialInit::default()
            },
        )
        .await?;
        self.issue_credential(
            &consumer,
            PluginKind::OAuth2,
            CredentialInit {
                name: "App".to_string(),
                redirect_urls: vec!["http://none".to_string()],
                client_id: key.clone(),
                client_secret: secret.clone(),
                ..CredentialInit::default()
            },
        )
        .await?;
        self.issue_credential(
            &consumer,
            PluginKind::SignAuth,
            CredentialInit {
                key: key.clone(),
                secret: secret.clone(),
                ..CredentialInit::default()
            },
        )
        .await?;
        self.issue_credential(
            &consumer,
            PluginKind::HmacAuth,
            CredentialInit {
                key,
                secret,
                ..CredentialInit::default()
            },
        )
        .await?;

        info!(consumer = %gateway_name, "created consumer with credential bundle");
        Ok(consumer)
    }

    /// Issue one credential for `consumer`.
    ///
    /// A plugin that is not enabled on the target backend is skipped
    /// silently; it must not block consumer creation. For the managed
    /// backend the credential row is persisted locally *before* the adapter
    /// call: the store, not the adapter's response, is what later
    /// reconstructs gateway-side consumer entries.
    pub async fn issue_credential(
        &self,
        consumer: &Consumer,
        plugin: PluginKind,
        init: CredentialInit,
    ) -> Result<Option<CredentialInit>> {
        match self.adapter.provider() {
            GatewayProvider::Legacy => {
                if plugin == PluginKind::HmacAuth
                    && !self.adapter.check_plugin_enabled(plugin).await?
                {
                    debug!(%plugin, "plugin not enabled, skipping credential");
                    return Ok(None);
                }
            }
            GatewayProvider::Managed => {
                if !self.adapter.check_plugin_enabled(plugin).await? {
                    debug!(%plugin, "plugin not enabled, skipping credential");
                    return Ok(None);
                }
                self.store.insert(&record_from_init(consumer, plugin, &init))?;
            }
        }

        let created = self
            .adapter
            .create_credential(plugin, &consumer.gateway_id, &init)
            .await?;
        Ok(Some(created))
    }

    /// Delete a consumer and everything hanging off it.
    ///
    /// Callers must have removed the consumer's package/route grant
    /// memberships first so no dangling references remain. For the managed
    /// backend every registered plugin with ACL-style configuration is
    /// rewritten without the consumer before local credential rows and the
    /// remote consumer object are removed. A failure part-way through is
    /// returned immediately; already-cleaned plugins stay cleaned.
    pub async fn delete_consumer(&self, consumer: &Consumer) -> Result<()> {
        match self.adapter.provider() {
            GatewayProvider::Managed => {
                let gateway_name = consumer.gateway_name();
                let kinds: Vec<PluginKind> = self.registry.kinds().collect();
                for plugin in kinds {
                    if !plugin.supports_acl_cleanup() {
                        continue;
                    }
                    let _guard = self.locks.acquire(self.registry.cluster(), plugin).await;
                    let Some(mut entry) = self.fetch_global_entry(plugin).await? else {
                        continue;
                    };
                    let next_config = match plugin {
                        PluginKind::KeyAuth => {
                            let current = from_yaml(&entry.config)?;
                            to_yaml(&key_auth::remove_consumer(&current, &gateway_name))?
                        }
                        PluginKind::HmacAuth => {
                            let current = from_yaml(&entry.config)?;
                            to_yaml(&hmac_auth::remove_consumer(&current, &gateway_name))?
                        }
                        PluginKind::ParamSignAuth => {
                            let current = from_yaml(&entry.config)?;
                            to_yaml(&param_sign::remove_consumer(&current, &gateway_name))?
                        }
                        _ => continue,
                    };
                    entry.config = next_config;
                    self.push_global_entry(plugin, &entry).await?;
                    debug!(%plugin, consumer = %gateway_name, "removed consumer from plugin config");
                }

                self.store.delete_by_consumer(&consumer.gateway_id)?;
                self.adapter.delete_consumer(&consumer.gateway_id).await?;
            }
            GatewayProvider::Legacy => {
                self.adapter.delete_consumer(&consumer.gateway_id).await?;
            }
        }

        info!(consumer = %consumer.gateway_name(), "deleted consumer");
        Ok(())
    }

    /// Delete one credential.
    ///
    /// For the managed backend the plugin's configuration is rewritten
    /// without the credential's consumer entry first, then the stored row is
    /// removed; the legacy backend deletes through the adapter directly.
    pub async fn delete_credential(
        &self,
        consumer: &Consumer,
        plugin: PluginKind,
        key: &str,
    ) -> Result<()> {
        match self.adapter.provider() {
            GatewayProvider::Managed => {
                if plugin.supports_acl_cleanup() && self.registry.contains(plugin) {
                    let _guard = self.locks.acquire(self.registry.cluster(), plugin).await;
                    if let Some(mut entry) = self.fetch_global_entry(plugin).await? {
                        let next_config = match plugin {
                            PluginKind::KeyAuth => {
                                let current = from_yaml(&entry.config)?;
                                to_yaml(&key_auth::remove_credential(&current, key))?
                            }
                            PluginKind::HmacAuth => {
                                let current = from_yaml(&entry.config)?;
                                to_yaml(&hmac_auth::remove_credential(&current, key))?
                            }
                            PluginKind::ParamSignAuth => {
                                let current = from_yaml(&entry.config)?;
                                to_yaml(&param_sign::remove_credential(&current, key))?
                            }
                            _ => entry.config.clone(),
                        };
                        entry.config = next_config;
                        self.push_global_entry(plugin, &entry).await?;
                    }
                }
                self.store
                    .delete_credential(&consumer.gateway_id, plugin, key)?;
            }
            GatewayProvider::Legacy => {
                self.adapter
                    .delete_credential(&consumer.gateway_id, plugin, key)
                    .await?;
            }
        }
        Ok(())
    }

    /// A consumer's credentials grouped by authentication scheme.
    ///
    /// The managed backend reads from the credential store; the legacy
    /// backend queries the adapter per kind, with a failing kind degrading
    /// to an empty list rather than an error.
    pub async fn consumer_credentials(&self, consumer: &Consumer) -> Result<CredentialBundle> {
        let mut bundle = CredentialBundle::default();
        match self.adapter.provider() {
            GatewayProvider::Legacy => {
                for (plugin, slot) in [
                    (PluginKind::KeyAuth, &mut bundle.key_auth),
                    (PluginKind::OAuth2, &mut bundle.oauth2),
                    (PluginKind::SignAuth, &mut bundle.sign_auth),
                    (PluginKind::HmacAuth, &mut bundle.hmac_auth),
                ] {
                    *slot = self
                        .adapter
                        .get_credential_list(&consumer.gateway_id, plugin)
                        .await
                        .unwrap_or_default();
                }
            }
            GatewayProvider::Managed => {
                for record in self.store.list_by_consumer(&consumer.gateway_id)? {
                    match record.plugin {
                        PluginKind::KeyAuth => bundle.key_auth.push(record),
                        PluginKind::OAuth2 => bundle.oauth2.push(record),
                        PluginKind::SignAuth => bundle.sign_auth.push(record),
                        PluginKind::HmacAuth => bundle.hmac_auth.push(record),
                        _ => {}
                    }
                }
            }
        }
        Ok(bundle)
    }
}

fn record_from_init(
    consumer: &Consumer,
    plugin: PluginKind,
    init: &CredentialInit,
) -> CredentialRecord {
    let mut record = CredentialRecord::new(consumer, plugin);
    record.id = Uuid::new_v4().to_string();
    record.key = init.key.clone();
    record.secret = init.secret.clone();
    record.name = init.name.clone();
    record.client_id = init.client_id.clone();
    record.client_secret = init.client_secret.clone();
    record.redirect_url = init.redirect_urls.join(",");
    record.username = init.username.clone();
    record
}

fn generate_secret() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

//! In-memory mock provider adapter shared by the integration tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use wicket_control_core::{ControlError, CredentialRecord, PluginKind, Result};
use wicket_reconciler::{
    ConfigLevel, ConsumerReply, ConsumerRequest, CredentialInit, GatewayProvider,
    PluginConfigEntry, ProviderAdapter,
};

#[derive(Default)]
pub struct MockState {
    pub consumers: Vec<ConsumerRequest>,
    pub deleted_consumers: Vec<String>,
    pub acl_groups: Vec<(String, String)>,
    pub created_credentials: Vec<(PluginKind, String, CredentialInit)>,
    pub deleted_credentials: Vec<(String, PluginKind, String)>,
    pub plugin_docs: HashMap<PluginKind, PluginConfigEntry>,
    pub disabled_plugins: Vec<PluginKind>,
    pub fail_credential_for: Option<PluginKind>,
    pub fail_update_for: Option<PluginKind>,
    pub pushes: Vec<(PluginKind, String)>,
    pub next_id: u64,
}

pub struct MockAdapter {
    provider: GatewayProvider,
    pub state: Mutex<MockState>,
}

impl MockAdapter {
    pub fn managed() -> Self {
        Self {
            provider: GatewayProvider::Managed,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn legacy() -> Self {
        Self {
            provider: GatewayProvider::Legacy,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn seed_plugin_doc(&self, plugin: PluginKind, config: &str, enabled: bool) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id as i64;
        state.plugin_docs.insert(
            plugin,
            PluginConfigEntry {
                id: Some(id),
                config_level: ConfigLevel::Global,
                enabled,
                config: config.to_string(),
            },
        );
    }

    pub fn disable_plugin(&self, plugin: PluginKind) {
        self.state.lock().unwrap().disabled_plugins.push(plugin);
    }

    pub fn fail_credential_for(&self, plugin: PluginKind) {
        self.state.lock().unwrap().fail_credential_for = Some(plugin);
    }

    pub fn fail_update_for(&self, plugin: PluginKind) {
        self.state.lock().unwrap().fail_update_for = Some(plugin);
    }

    pub fn doc(&self, plugin: PluginKind) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .plugin_docs
            .get(&plugin)
            .map(|entry| entry.config.clone())
    }

    pub fn pushes(&self, plugin: PluginKind) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .pushes
            .iter()
            .filter(|(kind, _)| *kind == plugin)
            .map(|(_, config)| config.clone())
            .collect()
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn provider(&self) -> GatewayProvider {
        self.provider
    }

    async fn create_consumer(&self, req: &ConsumerRequest) -> Result<ConsumerReply> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("gw-{}", state.next_id);
        state.consumers.push(req.clone());
        Ok(ConsumerReply {
            id,
            custom_id: req.custom_id.clone(),
            created_at: 0,
        })
    }

    async fn delete_consumer(&self, consumer_id: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .deleted_consumers
            .push(consumer_id.to_string());
        Ok(())
    }

    async fn create_acl_group(&self, consumer_id: &str, group_name: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .acl_groups
            .push((consumer_id.to_string(), group_name.to_string()));
        Ok(())
    }

    async fn create_credential(
        &self,
        plugin: PluginKind,
        consumer_id: &str,
        init: &CredentialInit,
    ) -> Result<CredentialInit> {
        let mut state = self.state.lock().unwrap();
        if state.fail_credential_for == Some(plugin) {
            return Err(ControlError::Provider(format!(
                "create credential rejected for plugin {plugin}"
            )));
        }
        state
            .created_credentials
            .push((plugin, consumer_id.to_string(), init.clone()));
        Ok(init.clone())
    }

    async fn delete_credential(
        &self,
        consumer_id: &str,
        plugin: PluginKind,
        key: &str,
    ) -> Result<()> {
        self.state.lock().unwrap().deleted_credentials.push((
            consumer_id.to_string(),
            plugin,
            key.to_string(),
        ));
        Ok(())
    }

    async fn get_credential_list(
        &self,
        _consumer_id: &str,
        _plugin: PluginKind,
    ) -> Result<Vec<CredentialRecord>> {
        Ok(Vec::new())
    }

    async fn check_plugin_enabled(&self, plugin: PluginKind) -> Result<bool> {
        Ok(!self
            .state
            .lock()
            .unwrap()
            .disabled_plugins
            .contains(&plugin))
    }

    async fn get_plugin(&self, plugin: PluginKind) -> Result<Vec<PluginConfigEntry>> {
        // Widen the read-modify-write window so unserialized callers would
        // actually interleave.
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state.plugin_docs.get(&plugin).cloned().into_iter().collect())
    }

    async fn update_plugin(
        &self,
        plugin: PluginKind,
        entry: &PluginConfigEntry,
    ) -> Result<(i64, usize)> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        if state.fail_update_for == Some(plugin) {
            return Err(ControlError::Provider(format!(
                "update rejected for plugin {plugin}"
            )));
        }
        state.plugin_docs.insert(plugin, entry.clone());
        state.pushes.push((plugin, entry.config.clone()));
        Ok((entry.id.unwrap_or(0), 1))
    }
}

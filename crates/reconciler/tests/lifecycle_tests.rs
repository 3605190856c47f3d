//! Consumer/credential lifecycle against a mock backend.

#[allow(dead_code)]
mod common;

use common::MockAdapter;
use tempfile::NamedTempFile;

use wicket_control_core::wire::{from_yaml, to_yaml, AclRule, ConsumerAclDocument, ConsumerEntry};
use wicket_control_core::wire::{ParamSignDocument, ParamSignRule};
use wicket_control_core::{
    Consumer, ConsumerKind, ConsumerScope, ControlError, CredentialRecord, PluginKind,
};
use wicket_credential_store::{CredentialStore, LocalSqliteBackend, SqliteCredentialStore};
use wicket_reconciler::{PluginRegistry, PolicyReconciler};

type Reconciler = PolicyReconciler<MockAdapter, SqliteCredentialStore>;

fn registry() -> PluginRegistry {
    PluginRegistry::new("cluster-a")
        .with_plugin(PluginKind::KeyAuth, 1)
        .with_plugin(PluginKind::HmacAuth, 2)
        .with_plugin(PluginKind::ParamSignAuth, 3)
        .with_plugin(PluginKind::Csrf, 4)
        .with_plugin(PluginKind::IpAcl, 5)
        .with_plugin(PluginKind::Sbac, 6)
}

fn reconciler(adapter: MockAdapter) -> (Reconciler, NamedTempFile) {
    let temp = NamedTempFile::new().unwrap();
    let store = SqliteCredentialStore::new(LocalSqliteBackend::new(temp.path()));
    (PolicyReconciler::new(adapter, store, registry()), temp)
}

fn scope() -> ConsumerScope {
    ConsumerScope::new("org1", "proj9", "dev", "cluster-a")
}

fn acl_entry(name: &str, credential: &str) -> ConsumerEntry {
    let mut entry = ConsumerEntry::named(name);
    entry.credential = Some(credential.to_string());
    entry
}

fn hmac_entry(name: &str, key: &str) -> ConsumerEntry {
    let mut entry = ConsumerEntry::named(name);
    entry.key = Some(key.to_string());
    entry.secret = Some(format!("{key}-secret"));
    entry
}

#[tokio::test]
async fn test_create_consumer_issues_full_bundle() {
    let (reconciler, _db) = reconciler(MockAdapter::managed());

    let consumer = reconciler
        .create_consumer(scope(), "billing", "billing team")
        .await
        .unwrap();
    assert!(consumer.gateway_id.starts_with("gw-"));
    assert_eq!(consumer.kind, ConsumerKind::Platform);

    {
        let state = reconciler.adapter().state.lock().unwrap();
        assert_eq!(state.consumers.len(), 1);
        assert_eq!(state.consumers[0].username, "org1.proj9.dev.cluster-a:billing");
        assert_eq!(state.acl_groups.len(), 1);
        assert_eq!(state.acl_groups[0].1, "org1.proj9.dev.cluster-a:billing");
        assert_eq!(state.created_credentials.len(), 4);
    }

    let rows = reconciler
        .store()
        .list_by_consumer(&consumer.gateway_id)
        .unwrap();
    assert_eq!(rows.len(), 4);

    let by_kind = |kind: PluginKind| -> &CredentialRecord {
        rows.iter().find(|r| r.plugin == kind).unwrap()
    };
    let key_auth = by_kind(PluginKind::KeyAuth);
    let oauth2 = by_kind(PluginKind::OAuth2);
    let sign = by_kind(PluginKind::SignAuth);
    let hmac = by_kind(PluginKind::HmacAuth);

    // One generated key/secret pair backs the whole bundle.
    assert_eq!(key_auth.key, hmac.key);
    assert_eq!(sign.key, hmac.key);
    assert_eq!(sign.secret, hmac.secret);
    assert_eq!(oauth2.client_id, key_auth.key);
    assert_eq!(oauth2.name, "App");
    assert_eq!(oauth2.redirect_url, "http://none");
}

#[tokio::test]
async fn test_create_consumer_skips_disabled_plugin() {
    let adapter = MockAdapter::managed();
    adapter.disable_plugin(PluginKind::OAuth2);
    let (reconciler, _db) = reconciler(adapter);

    let consumer = reconciler
        .create_consumer(scope(), "billing", "")
        .await
        .unwrap();

    let rows = reconciler
        .store()
        .list_by_consumer(&consumer.gateway_id)
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.plugin != PluginKind::OAuth2));
}

#[tokio::test]
async fn test_credential_persisted_before_adapter_call() {
    let adapter = MockAdapter::managed();
    adapter.fail_credential_for(PluginKind::SignAuth);
    let (reconciler, _db) = reconciler(adapter);

    let err = reconciler
        .create_consumer(scope(), "billing", "")
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Provider(_)));

    // The first adapter id handed out is gw-1.
    let rows = reconciler.store().list_by_consumer("gw-1").unwrap();
    let kinds: Vec<PluginKind> = rows.iter().map(|r| r.plugin).collect();
    // The failing kind was written to the store before the adapter rejected
    // it; the kind after it was never reached.
    assert_eq!(
        kinds,
        vec![PluginKind::KeyAuth, PluginKind::OAuth2, PluginKind::SignAuth]
    );
}

#[tokio::test]
async fn test_client_consumer_uses_supplied_identity() {
    let (reconciler, _db) = reconciler(MockAdapter::managed());

    let consumer = reconciler
        .create_client_consumer(scope(), "mobile-app", "client-id-1", "client-secret-1")
        .await
        .unwrap();
    assert_eq!(consumer.kind, ConsumerKind::ClientApp);

    let rows = reconciler
        .store()
        .list_by_consumer(&consumer.gateway_id)
        .unwrap();
    let key_auth = rows.iter().find(|r| r.plugin == PluginKind::KeyAuth).unwrap();
    assert_eq!(key_auth.key, "client-id-1");
    let oauth2 = rows.iter().find(|r| r.plugin == PluginKind::OAuth2).unwrap();
    assert_eq!(oauth2.client_id, "client-id-1");
    assert_eq!(oauth2.client_secret, "client-secret-1");
}

fn stored_consumer(reconciler: &Reconciler, name: &str, gateway_id: &str) -> Consumer {
    let consumer = Consumer {
        id: format!("id-{name}"),
        gateway_id: gateway_id.to_string(),
        scope: scope(),
        name: name.to_string(),
        kind: ConsumerKind::Platform,
        description: String::new(),
    };
    let mut record = CredentialRecord::new(&consumer, PluginKind::KeyAuth);
    record.id = format!("cr-{name}-key");
    record.key = format!("cred-{name}");
    reconciler.store().insert(&record).unwrap();
    let mut record = CredentialRecord::new(&consumer, PluginKind::HmacAuth);
    record.id = format!("cr-{name}-hmac");
    record.key = format!("hk-{name}");
    record.secret = format!("hs-{name}");
    reconciler.store().insert(&record).unwrap();
    consumer
}

#[tokio::test]
async fn test_delete_consumer_cascades_across_plugins() {
    let adapter = MockAdapter::managed();
    let (reconciler, _db) = reconciler(adapter);
    let consumer = stored_consumer(&reconciler, "billing", "gw-9");
    let name = consumer.gateway_name();

    let acl_doc = ConsumerAclDocument {
        consumers: vec![
            acl_entry(&name, "cred-billing"),
            acl_entry("other", "cred-other"),
        ],
        rules: vec![AclRule {
            match_route: vec!["route-1".into()],
            allow: vec![name.clone(), "other".into()],
        }],
        ..ConsumerAclDocument::default()
    };
    reconciler
        .adapter()
        .seed_plugin_doc(PluginKind::KeyAuth, &to_yaml(&acl_doc).unwrap(), true);

    // hmac-auth consumers are keyed by their key/secret pair, not a bare
    // credential.
    let hmac_doc = ConsumerAclDocument {
        consumers: vec![hmac_entry(&name, "hk-billing"), hmac_entry("other", "hk-other")],
        rules: vec![AclRule {
            match_route: vec!["route-1".into()],
            allow: vec![name.clone(), "other".into()],
        }],
        ..ConsumerAclDocument::default()
    };
    reconciler
        .adapter()
        .seed_plugin_doc(PluginKind::HmacAuth, &to_yaml(&hmac_doc).unwrap(), true);

    let mut sign_entry = ConsumerEntry::named(name.as_str());
    sign_entry.key = Some("hk-billing".into());
    sign_entry.secret = Some("hs-billing".into());
    let para_doc = ParamSignDocument {
        rules: vec![ParamSignRule {
            match_route: vec!["route-1".into()],
            consumers: vec![sign_entry, {
                let mut other = ConsumerEntry::named("other");
                other.key = Some("hk-other".into());
                other
            }],
            request_body_size_limit: Some(1024),
            date_offset: Some(60),
        }],
    };
    reconciler
        .adapter()
        .seed_plugin_doc(PluginKind::ParamSignAuth, &to_yaml(&para_doc).unwrap(), true);

    reconciler.delete_consumer(&consumer).await.unwrap();

    for plugin in [PluginKind::KeyAuth, PluginKind::HmacAuth, PluginKind::ParamSignAuth] {
        let doc = reconciler.adapter().doc(plugin).unwrap();
        assert!(!doc.contains(&name), "{plugin} still references {name}: {doc}");
        assert!(doc.contains("other"), "{plugin} lost an unrelated consumer");
    }

    assert!(reconciler.store().list_by_consumer("gw-9").unwrap().is_empty());
    assert_eq!(
        reconciler.adapter().state.lock().unwrap().deleted_consumers,
        vec!["gw-9".to_string()]
    );
}

#[tokio::test]
async fn test_delete_consumer_partial_failure_keeps_earlier_cleanup() {
    let adapter = MockAdapter::managed();
    adapter.fail_update_for(PluginKind::HmacAuth);
    let (reconciler, _db) = reconciler(adapter);
    let consumer = stored_consumer(&reconciler, "billing", "gw-9");
    let name = consumer.gateway_name();

    let acl_doc = ConsumerAclDocument {
        consumers: vec![acl_entry(&name, "cred-billing")],
        rules: vec![AclRule {
            match_route: vec!["route-1".into()],
            allow: vec![name.clone()],
        }],
        ..ConsumerAclDocument::default()
    };
    reconciler
        .adapter()
        .seed_plugin_doc(PluginKind::KeyAuth, &to_yaml(&acl_doc).unwrap(), true);
    reconciler
        .adapter()
        .seed_plugin_doc(PluginKind::HmacAuth, &to_yaml(&acl_doc).unwrap(), true);

    let err = reconciler.delete_consumer(&consumer).await.unwrap_err();
    assert!(matches!(err, ControlError::Provider(_)));

    // key-auth cleanup (ordered before hmac-auth) already happened and is
    // not rolled back; credentials and the remote consumer survive for the
    // caller to retry.
    assert!(!reconciler
        .adapter()
        .doc(PluginKind::KeyAuth)
        .unwrap()
        .contains(&name));
    assert!(!reconciler.store().list_by_consumer("gw-9").unwrap().is_empty());
    assert!(reconciler
        .adapter()
        .state
        .lock()
        .unwrap()
        .deleted_consumers
        .is_empty());
}

#[tokio::test]
async fn test_delete_credential_rewrites_plugin_config_and_store() {
    let (reconciler, _db) = reconciler(MockAdapter::managed());
    let consumer = stored_consumer(&reconciler, "billing", "gw-9");
    let name = consumer.gateway_name();

    let acl_doc = ConsumerAclDocument {
        consumers: vec![
            acl_entry(&name, "cred-billing"),
            acl_entry("other", "cred-other"),
        ],
        rules: vec![AclRule {
            match_route: vec!["route-1".into()],
            allow: vec![name.clone(), "other".into()],
        }],
        ..ConsumerAclDocument::default()
    };
    reconciler
        .adapter()
        .seed_plugin_doc(PluginKind::KeyAuth, &to_yaml(&acl_doc).unwrap(), true);

    reconciler
        .delete_credential(&consumer, PluginKind::KeyAuth, "cred-billing")
        .await
        .unwrap();

    let doc: ConsumerAclDocument =
        from_yaml(&reconciler.adapter().doc(PluginKind::KeyAuth).unwrap()).unwrap();
    assert!(doc
        .consumers
        .iter()
        .all(|c| c.credential.as_deref() != Some("cred-billing")));
    // The identity's grant survives the credential removal.
    assert!(doc.rules.iter().any(|r| r.allow.contains(&name)));

    let rows = reconciler.store().list_by_consumer("gw-9").unwrap();
    assert!(rows
        .iter()
        .all(|r| !(r.plugin == PluginKind::KeyAuth && r.key == "cred-billing")));
}

#[tokio::test]
async fn test_consumer_credentials_groups_by_kind() {
    let (reconciler, _db) = reconciler(MockAdapter::managed());
    let consumer = reconciler
        .create_consumer(scope(), "billing", "")
        .await
        .unwrap();

    let bundle = reconciler.consumer_credentials(&consumer).await.unwrap();
    assert_eq!(bundle.key_auth.len(), 1);
    assert_eq!(bundle.oauth2.len(), 1);
    assert_eq!(bundle.sign_auth.len(), 1);
    assert_eq!(bundle.hmac_auth.len(), 1);
}

#[tokio::test]
async fn test_legacy_lifecycle_does_not_touch_store() {
    let (reconciler, _db) = reconciler(MockAdapter::legacy());

    let consumer = reconciler
        .create_consumer(scope(), "billing", "")
        .await
        .unwrap();
    assert!(reconciler
        .store()
        .list_by_consumer(&consumer.gateway_id)
        .unwrap()
        .is_empty());
    assert_eq!(
        reconciler
            .adapter()
            .state
            .lock()
            .unwrap()
            .created_credentials
            .len(),
        4
    );

    reconciler.delete_consumer(&consumer).await.unwrap();
    let state = reconciler.adapter().state.lock().unwrap();
    assert_eq!(state.deleted_consumers, vec![consumer.gateway_id.clone()]);
    assert!(state.pushes.is_empty(), "legacy deletion must not rewrite plugin docs");
}

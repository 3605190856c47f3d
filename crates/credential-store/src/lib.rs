//! Wicket Credential Store
//!
//! Durable record of which credential belongs to which consumer and which
//! plugin. For the managed gateway backend this store, not the gateway's
//! create-credential response, is the source of truth used to reconstruct a
//! consumer's gateway-side identity, so rows are written before the remote
//! call is made.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::debug;

use wicket_control_core::{init_sqlite_schema, ControlError, CredentialRecord, PluginKind, Result};

/// Backend abstraction for credential storage
///
/// Implementations handle different storage mechanisms; the local SQLite
/// file is the primary one. Each call opens a fresh connection so the store
/// stays `Send + Sync` without holding a connection across await points.
pub trait CredentialBackend: Send + Sync {
    /// Get a connection to the credential database, initializing the schema
    /// if needed.
    fn get_connection(&self) -> Result<Connection>;

    /// Check if the store exists
    fn exists(&self) -> Result<bool>;

    /// Initialize a new store (create the database file)
    fn initialize(&self) -> Result<()>;
}

/// Local filesystem SQLite backend
#[derive(Clone, Debug)]
pub struct LocalSqliteBackend {
    path: PathBuf,
}

impl LocalSqliteBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialBackend for LocalSqliteBackend {
    fn get_connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_sqlite_schema(&conn)?;
        Ok(conn)
    }

    fn exists(&self) -> Result<bool> {
        Ok(self.path.exists())
    }

    fn initialize(&self) -> Result<()> {
        if self.exists()? {
            return Err(ControlError::Other(format!(
                "credential store already exists at {:?}",
                self.path
            )));
        }

        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_sqlite_schema(&conn)?;

        Ok(())
    }
}

/// Lookup and mutation operations the reconciler needs from a credential
/// store. Kept synchronous: every implementation is an in-process database.
pub trait CredentialStore: Send + Sync {
    fn insert(&self, record: &CredentialRecord) -> Result<()>;

    /// All credentials of one consumer, in insertion order.
    fn list_by_consumer(&self, consumer_id: &str) -> Result<Vec<CredentialRecord>>;

    fn list_by_consumer_and_plugin(
        &self,
        consumer_id: &str,
        plugin: PluginKind,
    ) -> Result<Vec<CredentialRecord>>;

    /// Remove every credential of one consumer; returns the number removed.
    fn delete_by_consumer(&self, consumer_id: &str) -> Result<usize>;

    /// Remove the credential identified by (consumer, plugin, key).
    fn delete_credential(
        &self,
        consumer_id: &str,
        plugin: PluginKind,
        key: &str,
    ) -> Result<usize>;
}

/// SQLite-backed credential store
#[derive(Clone, Debug)]
pub struct SqliteCredentialStore<B: CredentialBackend = LocalSqliteBackend> {
    backend: B,
}

impl<B: CredentialBackend> SqliteCredentialStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

const ALL_COLUMNS: &str = "id, consumer_id, consumer_name, plugin, org_id, project_id, env, cluster, \
     key, secret, issuer, jwks, from_params, from_cookies, keep_token, clock_skew_seconds, \
     redirect_url, redirect_urls, name, client_id, client_secret, username, created_at";

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<CredentialRecord> {
    let plugin_name: String = row.get(3)?;
    let plugin: PluginKind = plugin_name.parse().map_err(|e: ControlError| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(CredentialRecord {
        id: row.get(0)?,
        consumer_id: row.get(1)?,
        consumer_name: row.get(2)?,
        plugin,
        org_id: row.get(4)?,
        project_id: row.get(5)?,
        env: row.get(6)?,
        cluster: row.get(7)?,
        key: row.get(8)?,
        secret: row.get(9)?,
        issuer: row.get(10)?,
        jwks: row.get(11)?,
        from_params: row.get(12)?,
        from_cookies: row.get(13)?,
        keep_token: row.get(14)?,
        clock_skew_seconds: row.get(15)?,
        redirect_url: row.get(16)?,
        redirect_urls: row.get(17)?,
        name: row.get(18)?,
        client_id: row.get(19)?,
        client_secret: row.get(20)?,
        username: row.get(21)?,
        created_at: row.get(22)?,
    })
}

impl<B: CredentialBackend> CredentialStore for SqliteCredentialStore<B> {
    fn insert(&self, record: &CredentialRecord) -> Result<()> {
        let conn = self.backend.get_connection()?;
        conn.execute(
            "INSERT INTO credentials (id, consumer_id, consumer_name, plugin, org_id, project_id, env, cluster, \
             key, secret, issuer, jwks, from_params, from_cookies, keep_token, clock_skew_seconds, \
             redirect_url, redirect_urls, name, client_id, client_secret, username, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
            rusqlite::params![
                record.id,
                record.consumer_id,
                record.consumer_name,
                record.plugin.as_str(),
                record.org_id,
                record.project_id,
                record.env,
                record.cluster,
                record.key,
                record.secret,
                record.issuer,
                record.jwks,
                record.from_params,
                record.from_cookies,
                record.keep_token,
                record.clock_skew_seconds,
                record.redirect_url,
                record.redirect_urls,
                record.name,
                record.client_id,
                record.client_secret,
                record.username,
                record.created_at,
            ],
        )?;
        debug!(
            consumer_id = %record.consumer_id,
            plugin = %record.plugin,
            "stored credential"
        );
        Ok(())
    }

    fn list_by_consumer(&self, consumer_id: &str) -> Result<Vec<CredentialRecord>> {
        let conn = self.backend.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ALL_COLUMNS} FROM credentials WHERE consumer_id = ?1 ORDER BY rowid"
        ))?;
        let records = stmt
            .query_map([consumer_id], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn list_by_consumer_and_plugin(
        &self,
        consumer_id: &str,
        plugin: PluginKind,
    ) -> Result<Vec<CredentialRecord>> {
        let conn = self.backend.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ALL_COLUMNS} FROM credentials WHERE consumer_id = ?1 AND plugin = ?2 ORDER BY rowid"
        ))?;
        let records = stmt
            .query_map(rusqlite::params![consumer_id, plugin.as_str()], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn delete_by_consumer(&self, consumer_id: &str) -> Result<usize> {
        let conn = self.backend.get_connection()?;
        let removed = conn.execute(
            "DELETE FROM credentials WHERE consumer_id = ?1",
            [consumer_id],
        )?;
        debug!(consumer_id = %consumer_id, removed, "deleted consumer credentials");
        Ok(removed)
    }

    fn delete_credential(
        &self,
        consumer_id: &str,
        plugin: PluginKind,
        key: &str,
    ) -> Result<usize> {
        let conn = self.backend.get_connection()?;
        let removed = conn.execute(
            "DELETE FROM credentials WHERE consumer_id = ?1 AND plugin = ?2 AND key = ?3",
            rusqlite::params![consumer_id, plugin.as_str(), key],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use wicket_control_core::{Consumer, ConsumerKind, ConsumerScope};

    fn consumer() -> Consumer {
        Consumer {
            id: "c-1".into(),
            gateway_id: "gw-1".into(),
            scope: ConsumerScope::new("org1", "proj9", "dev", "cluster-a"),
            name: "billing".into(),
            kind: ConsumerKind::Platform,
            description: String::new(),
        }
    }

    fn record(id: &str, plugin: PluginKind, key: &str) -> CredentialRecord {
        let mut record = CredentialRecord::new(&consumer(), plugin);
        record.id = id.into();
        record.key = key.into();
        record.secret = format!("{key}-secret");
        record
    }

    fn store() -> (SqliteCredentialStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = SqliteCredentialStore::new(LocalSqliteBackend::new(temp_file.path()));
        (store, temp_file)
    }

    #[test]
    fn test_backend_initialize() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();
        std::fs::remove_file(&path).unwrap();

        let backend = LocalSqliteBackend::new(&path);
        assert!(!backend.exists().unwrap());

        backend.initialize().unwrap();
        assert!(backend.exists().unwrap());

        // Second initialize must fail.
        assert!(backend.initialize().is_err());
    }

    #[test]
    fn test_insert_and_round_trip() {
        let (store, _guard) = store();
        let mut stored = record("cr-1", PluginKind::JwtAuth, "k1");
        stored.from_params = "access_token".into();
        stored.keep_token = "N".into();
        stored.clock_skew_seconds = "90".into();
        store.insert(&stored).unwrap();

        let listed = store.list_by_consumer("gw-1").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], stored);
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let (store, _guard) = store();
        store.insert(&record("cr-1", PluginKind::KeyAuth, "k1")).unwrap();
        store.insert(&record("cr-2", PluginKind::HmacAuth, "k2")).unwrap();
        store.insert(&record("cr-3", PluginKind::KeyAuth, "k3")).unwrap();

        let listed = store.list_by_consumer("gw-1").unwrap();
        let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["cr-1", "cr-2", "cr-3"]);

        let key_auth = store
            .list_by_consumer_and_plugin("gw-1", PluginKind::KeyAuth)
            .unwrap();
        let ids: Vec<&str> = key_auth.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["cr-1", "cr-3"]);
    }

    #[test]
    fn test_delete_by_consumer() {
        let (store, _guard) = store();
        store.insert(&record("cr-1", PluginKind::KeyAuth, "k1")).unwrap();
        store.insert(&record("cr-2", PluginKind::HmacAuth, "k2")).unwrap();

        assert_eq!(store.delete_by_consumer("gw-1").unwrap(), 2);
        assert!(store.list_by_consumer("gw-1").unwrap().is_empty());
        assert_eq!(store.delete_by_consumer("gw-1").unwrap(), 0);
    }

    #[test]
    fn test_delete_single_credential() {
        let (store, _guard) = store();
        store.insert(&record("cr-1", PluginKind::KeyAuth, "k1")).unwrap();
        store.insert(&record("cr-2", PluginKind::KeyAuth, "k2")).unwrap();

        assert_eq!(
            store
                .delete_credential("gw-1", PluginKind::KeyAuth, "k1")
                .unwrap(),
            1
        );
        let remaining = store.list_by_consumer("gw-1").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].key, "k2");
    }

    #[test]
    fn test_unknown_consumer_lists_empty() {
        let (store, _guard) = store();
        assert!(store.list_by_consumer("nobody").unwrap().is_empty());
    }
}

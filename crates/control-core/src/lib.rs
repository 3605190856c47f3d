//! Wicket Control-Plane Core
//!
//! Core types, gateway wire documents, and the plugin-configuration merge
//! engine for the Wicket API-gateway control plane.
//!
//! The merge engine (see [`merge`]) is a set of pure functions that compute,
//! from the currently-deployed remote plugin configuration and a desired
//! change, the next configuration to push. It performs no I/O and can be
//! unit-tested without a gateway.

pub mod consumer;
pub mod credential;
pub mod defaults;
pub mod merge;
pub mod wire;

pub use consumer::{Consumer, ConsumerKind, ConsumerScope, PluginKind};
pub use credential::CredentialRecord;

/// Errors that can occur in control-plane operations
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// A credential value is already bound to a different consumer identity.
    /// This is a configuration-integrity error and is never auto-resolved.
    #[error("credential {credential} already belongs to consumer {existing}, refusing to rebind it to {incoming}")]
    CredentialConflict {
        credential: String,
        existing: String,
        incoming: String,
    },

    #[error("malformed plugin document: {0}")]
    MalformedDocument(#[from] serde_yaml::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("gateway provider error: {0}")]
    Provider(String),

    #[error("no credential info found for consumer {0}")]
    MissingCredential(String),

    #[error("{0}")]
    Other(String),
}

/// Result type for control-plane operations
pub type Result<T> = std::result::Result<T, ControlError>;

/// Initialize the SQLite schema for the credential store
///
/// Creates the `credentials` table if it does not exist. The table is a
/// superset record reused across all plugin kinds; columns a given kind does
/// not use stay at their empty-string default.
pub fn init_sqlite_schema(conn: &rusqlite::Connection) -> Result<()> {
    let ddl = r#"
    CREATE TABLE IF NOT EXISTS credentials (
      id TEXT PRIMARY KEY,
      consumer_id TEXT NOT NULL,
      consumer_name TEXT NOT NULL,
      plugin TEXT NOT NULL,
      org_id TEXT NOT NULL DEFAULT '',
      project_id TEXT NOT NULL DEFAULT '',
      env TEXT NOT NULL DEFAULT '',
      cluster TEXT NOT NULL DEFAULT '',
      key TEXT NOT NULL DEFAULT '',
      secret TEXT NOT NULL DEFAULT '',
      issuer TEXT NOT NULL DEFAULT '',
      jwks TEXT NOT NULL DEFAULT '',
      from_params TEXT NOT NULL DEFAULT '',
      from_cookies TEXT NOT NULL DEFAULT '',
      keep_token TEXT NOT NULL DEFAULT '',
      clock_skew_seconds TEXT NOT NULL DEFAULT '',
      redirect_url TEXT NOT NULL DEFAULT '',
      redirect_urls TEXT NOT NULL DEFAULT '',
      name TEXT NOT NULL DEFAULT '',
      client_id TEXT NOT NULL DEFAULT '',
      client_secret TEXT NOT NULL DEFAULT '',
      username TEXT NOT NULL DEFAULT '',
      created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_credentials_consumer ON credentials(consumer_id);
    CREATE INDEX IF NOT EXISTS idx_credentials_consumer_plugin ON credentials(consumer_id, plugin);
    "#;

    conn.execute_batch(ddl)?;
    Ok(())
}

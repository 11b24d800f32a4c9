//! Local relational mirror of one guild, backed by SQLite.
//!
//! Every write is an idempotent upsert or insert-or-ignore, so a sync run that
//! dies halfway can simply be repeated.

pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;

use mirror_types::{Fingerprint, Snowflake};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub use error::{StoreError, StoreResult};

/// Schema generation written into every new store's fingerprint.
pub const SCHEMA_VERSION: &str = "discord_mirror_v1";

pub struct LocalStore {
    conn: Mutex<Connection>,
    fingerprint: Fingerprint,
}

impl LocalStore {
    /// Open (or create) the mirror for `guild_id` at `path`.
    pub fn open(path: &Path, guild_id: Snowflake) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self::open_with(conn, Fingerprint::new(guild_id, SCHEMA_VERSION))?;
        // Only a verified mirror has its journal mode switched.
        store.with_conn(|conn| Ok(conn.pragma_update(None, "journal_mode", "WAL")?))?;
        info!("Mirror store opened at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory(guild_id: Snowflake) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::open_with(conn, Fingerprint::new(guild_id, SCHEMA_VERSION))
    }

    /// Open over an existing connection with an explicit fingerprint.
    ///
    /// An empty database gets the schema and `fingerprint`; a populated one
    /// must already carry exactly `fingerprint`.
    pub fn open_with(mut conn: Connection, fingerprint: Fingerprint) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&mut conn, &fingerprint)?;

        Ok(Self {
            conn: Mutex::new(conn),
            fingerprint,
        })
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        f(&conn)
    }
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> StoreResult<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> StoreResult<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

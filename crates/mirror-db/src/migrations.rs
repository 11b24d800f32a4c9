use mirror_types::Fingerprint;
use rusqlite::Connection;
use tracing::info;

use crate::{OptionalExt, StoreError, StoreResult};

const SCHEMA: &str = "
    CREATE TABLE meta (
        zero    INTEGER PRIMARY KEY CHECK (zero = 0),
        config  TEXT NOT NULL
    );

    CREATE TABLE channels (
        id      TEXT PRIMARY KEY,
        type    TEXT NOT NULL,
        name    TEXT NOT NULL
    );

    CREATE TABLE users (
        id              TEXT PRIMARY KEY,
        username        TEXT NOT NULL,
        discriminator   TEXT NOT NULL,
        bot             INTEGER NOT NULL CHECK (bot IN (0, 1))
    );

    CREATE TABLE members (
        user_id     TEXT PRIMARY KEY REFERENCES users(id),
        nick        TEXT
    );

    -- author_id has no foreign key: webhook authors are not users.
    CREATE TABLE messages (
        id                  TEXT PRIMARY KEY,
        channel_id          TEXT NOT NULL REFERENCES channels(id),
        author_id           TEXT NOT NULL,
        non_user_author     INTEGER NOT NULL CHECK (non_user_author IN (0, 1)),
        timestamp_ms        INTEGER NOT NULL,
        content             TEXT NOT NULL
    );

    -- Ids are normalised digit strings, so (length, text) is numeric order.
    CREATE INDEX idx_messages_channel
        ON messages(channel_id, LENGTH(id), id);

    CREATE TABLE message_reactions (
        channel_id  TEXT NOT NULL,
        message_id  TEXT NOT NULL,
        author_id   TEXT NOT NULL,
        emoji       TEXT NOT NULL,
        PRIMARY KEY (channel_id, message_id, author_id, emoji)
    );

    CREATE TABLE message_mentions (
        channel_id  TEXT NOT NULL,
        message_id  TEXT NOT NULL,
        user_id     TEXT NOT NULL,
        PRIMARY KEY (channel_id, message_id, user_id)
    );
";

/// Create the schema on an empty database, or verify the fingerprint of an
/// existing one. Never migrates or wipes a populated store.
pub fn run(conn: &mut Connection, fingerprint: &Fingerprint) -> StoreResult<()> {
    let tx = conn.transaction()?;

    let has_meta: bool = tx.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'meta')",
        [],
        |row| row.get(0),
    )?;

    if has_meta {
        let stored: String = tx
            .query_row("SELECT config FROM meta WHERE zero = 0", [], |row| row.get(0))
            .optional()?
            .ok_or_else(|| StoreError::CorruptFingerprint("meta table has no row".into()))?;

        let stored: Fingerprint = serde_json::from_str(&stored)
            .map_err(|e| StoreError::CorruptFingerprint(e.to_string()))?;

        if stored != *fingerprint {
            return Err(StoreError::ConfigMismatch {
                stored,
                requested: fingerprint.clone(),
            });
        }

        info!("Mirror fingerprint verified ({})", fingerprint);
        return Ok(());
    }

    let table_count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
        [],
        |row| row.get(0),
    )?;
    if table_count > 0 {
        return Err(StoreError::NotAMirror);
    }

    tx.execute_batch(SCHEMA)?;
    tx.execute(
        "INSERT INTO meta (zero, config) VALUES (0, ?1)",
        [serde_json::to_string(fingerprint)?],
    )?;
    tx.commit()?;

    info!("Mirror schema created ({})", fingerprint);
    Ok(())
}

use mirror_types::Fingerprint;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store was created for another guild or schema generation.
    #[error("store fingerprint mismatch: store holds {stored}, but {requested} was requested")]
    ConfigMismatch {
        stored: Fingerprint,
        requested: Fingerprint,
    },

    #[error("database has tables but no mirror fingerprint; refusing to use it as a mirror")]
    NotAMirror,

    #[error("corrupt fingerprint: {0}")]
    CorruptFingerprint(String),

    #[error("message {message_id} references channel {channel_id}, which is not in the store")]
    UnknownChannel {
        message_id: String,
        channel_id: String,
    },

    #[error("message {message_id} references author {author_id}, which is not in the store")]
    UnknownAuthor {
        message_id: String,
        author_id: String,
    },

    #[error("emoji on message {message_id} has an empty name")]
    InvalidEmoji { message_id: String },

    #[error("column {column} holds {value}, expected 0 or 1")]
    InvalidBool { column: &'static str, value: i64 },

    #[error("column {column} holds invalid id {value:?}")]
    InvalidId { column: &'static str, value: String },

    #[error("column {column} holds invalid value {value:?}")]
    InvalidValue { column: &'static str, value: String },

    #[error("store lock poisoned: {0}")]
    LockPoisoned(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

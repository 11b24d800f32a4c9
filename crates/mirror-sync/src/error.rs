use mirror_db::StoreError;
use mirror_types::Snowflake;
use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(
        "guild {guild_id} is not among the accessible guilds; \
         check that the bot has been invited to it"
    )]
    GuildNotFound { guild_id: Snowflake },

    #[error("remote api error: {0:#}")]
    Remote(anyhow::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A full page came back without moving the cursor forward.
    #[error("channel {channel_id}: remote returned a full page without ids after {after}")]
    Stalled {
        channel_id: Snowflake,
        after: Snowflake,
    },

    #[error("store task failed: {0}")]
    Join(String),
}

impl SyncError {
    /// Errors that abort a whole run rather than a single channel.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::GuildNotFound { .. }
                | SyncError::Store(StoreError::ConfigMismatch { .. })
        )
    }
}

//! Shared domain types for the guild mirror.
//!
//! Everything here is plain data: the sync engine fills these from the remote
//! platform, the store persists them, and downstream consumers address them
//! through [`graph`].

pub mod emoji;
pub mod graph;
pub mod models;
pub mod snowflake;

pub use emoji::Emoji;
pub use models::{Channel, ChannelKind, Fingerprint, Guild, GuildMember, Message, Reaction, User};
pub use snowflake::{Snowflake, SnowflakeError};

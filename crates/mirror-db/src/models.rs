//! Database row types and the conversions at the storage boundary.
//!
//! Rows hold exactly what SQLite returns. Turning them into domain types is
//! where booleans, ids and enum columns get validated; nothing else in the
//! crate converts column values by hand.

use mirror_types::{Channel, Emoji, GuildMember, Message, Reaction, Snowflake, User};

use crate::{StoreError, StoreResult};

pub fn encode_bool(value: bool) -> i64 {
    if value { 1 } else { 0 }
}

pub fn decode_bool(column: &'static str, value: i64) -> StoreResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        value => Err(StoreError::InvalidBool { column, value }),
    }
}

pub fn decode_id(column: &'static str, value: String) -> StoreResult<Snowflake> {
    Snowflake::parse(&value).map_err(|_| StoreError::InvalidId { column, value })
}

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub discriminator: String,
    pub bot: i64,
}

impl UserRow {
    pub fn into_user(self) -> StoreResult<User> {
        Ok(User {
            id: decode_id("users.id", self.id)?,
            username: self.username,
            discriminator: self.discriminator,
            bot: decode_bool("users.bot", self.bot)?,
        })
    }
}

pub struct MemberRow {
    pub user: UserRow,
    pub nick: Option<String>,
}

impl MemberRow {
    pub fn into_member(self) -> StoreResult<GuildMember> {
        Ok(GuildMember {
            user: self.user.into_user()?,
            nick: self.nick,
        })
    }
}

pub struct ChannelRow {
    pub id: String,
    pub kind: String,
    pub name: String,
}

impl ChannelRow {
    pub fn into_channel(self) -> StoreResult<Channel> {
        let kind = self.kind.parse().map_err(|_| StoreError::InvalidValue {
            column: "channels.type",
            value: self.kind.clone(),
        })?;
        Ok(Channel {
            id: decode_id("channels.id", self.id)?,
            name: self.name,
            kind,
        })
    }
}

/// A `messages` row; reactions and mentions live in their own tables.
pub struct MessageRow {
    pub id: String,
    pub channel_id: String,
    pub author_id: String,
    pub non_user_author: i64,
    pub timestamp_ms: i64,
    pub content: String,
}

impl MessageRow {
    pub fn into_message(
        self,
        reaction_emoji: Vec<Emoji>,
        mentions: Vec<Snowflake>,
    ) -> StoreResult<Message> {
        Ok(Message {
            id: decode_id("messages.id", self.id)?,
            channel_id: decode_id("messages.channel_id", self.channel_id)?,
            author_id: decode_id("messages.author_id", self.author_id)?,
            timestamp_ms: self.timestamp_ms,
            content: self.content,
            reaction_emoji,
            non_user_author: decode_bool("messages.non_user_author", self.non_user_author)?,
            mentions,
        })
    }
}

pub struct ReactionRow {
    pub channel_id: String,
    pub message_id: String,
    pub author_id: String,
    pub emoji: String,
}

impl ReactionRow {
    pub fn into_reaction(self) -> StoreResult<Reaction> {
        Ok(Reaction {
            emoji: Emoji::from_ref(&self.emoji),
            channel_id: decode_id("message_reactions.channel_id", self.channel_id)?,
            message_id: decode_id("message_reactions.message_id", self.message_id)?,
            author_id: decode_id("message_reactions.author_id", self.author_id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_codec() {
        assert_eq!(encode_bool(true), 1);
        assert_eq!(encode_bool(false), 0);
        assert!(decode_bool("t.c", 1).unwrap());
        assert!(!decode_bool("t.c", 0).unwrap());
        assert!(matches!(
            decode_bool("t.c", 2),
            Err(StoreError::InvalidBool { value: 2, .. })
        ));
    }

    #[test]
    fn bad_id_is_reported_with_column() {
        let err = decode_id("users.id", "abc".into()).unwrap_err();
        assert!(err.to_string().contains("users.id"));
    }
}

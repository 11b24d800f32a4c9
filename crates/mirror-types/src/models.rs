use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::emoji::Emoji;
use crate::snowflake::Snowflake;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: String,
    pub bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMember {
    pub user: User,
    pub nick: Option<String>,
}

/// Channel kinds the remote platform reports. Only [`ChannelKind::Text`] is mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
    Other,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
            Self::Category => "category",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "voice" => Ok(Self::Voice),
            "category" => Ok(Self::Category),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown channel kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Snowflake,
    pub name: String,
    pub kind: ChannelKind,
}

/// A chat message as mirrored.
///
/// `reaction_emoji` lists the emoji kinds present on the message and
/// `mentions` the mentioned user ids; the store keeps both in association
/// tables and rebuilds them on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub author_id: Snowflake,
    pub timestamp_ms: i64,
    pub content: String,
    pub reaction_emoji: Vec<Emoji>,
    /// Set for webhook and system messages whose author is not a guild user.
    pub non_user_author: bool,
    pub mentions: Vec<Snowflake>,
}

/// One user's reaction with one emoji kind on one message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: Emoji,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    pub author_id: Snowflake,
}

/// Identifies which logical mirror a store holds. Written once per store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    #[serde(rename = "guild")]
    pub guild_id: Snowflake,
    #[serde(rename = "version")]
    pub schema_version: String,
}

impl Fingerprint {
    pub fn new(guild_id: Snowflake, schema_version: impl Into<String>) -> Self {
        Self {
            guild_id,
            schema_version: schema_version.into(),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "guild {} @ {}", self.guild_id, self.schema_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_kind_text_form() {
        for kind in [
            ChannelKind::Text,
            ChannelKind::Voice,
            ChannelKind::Category,
            ChannelKind::Other,
        ] {
            assert_eq!(kind.as_str().parse::<ChannelKind>(), Ok(kind));
        }
        assert!("forum".parse::<ChannelKind>().is_err());
    }

    #[test]
    fn fingerprint_json_shape() {
        let fp = Fingerprint::new(Snowflake::from(453243919774253079), "discord_mirror_v1");
        let json = serde_json::to_value(&fp).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "guild": "453243919774253079", "version": "discord_mirror_v1" })
        );
    }
}

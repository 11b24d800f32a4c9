//! [`RemoteApi`] over the Discord REST API, authenticated as a bot.
//!
//! Only what the mirror needs is mapped. Non-2xx responses surface as errors;
//! retries and rate-limit handling are left to the caller.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use mirror_types::{Channel, ChannelKind, Emoji, Guild, GuildMember, Message, Snowflake, User};

use crate::remote::RemoteApi;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Largest `limit` the messages endpoint accepts.
const MESSAGES_PAGE_LIMIT: usize = 100;
const MEMBERS_PAGE_LIMIT: usize = 1000;
const REACTIONS_PAGE_LIMIT: usize = 100;

pub struct DiscordClient {
    http: Client,
    base: Url,
    token: String,
}

impl DiscordClient {
    pub fn new(api_base: &str, token: impl Into<String>) -> Result<Self> {
        let base = Url::parse(api_base).with_context(|| format!("invalid API base {api_base}"))?;
        if base.cannot_be_a_base() {
            bail!("API base {api_base} cannot carry a path");
        }
        let http = Client::builder()
            .user_agent(concat!("guild-mirror/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base,
            token: token.into(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("API base {} cannot carry a path", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, String)]) -> Result<T> {
        let url = self.url(segments)?;
        debug!("GET {}", url.path());
        let response = self
            .http
            .get(url.clone())
            .query(query)
            .header(AUTHORIZATION, format!("Bot {}", self.token))
            .send()
            .await
            .with_context(|| format!("GET {}", url.path()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("GET {} returned {}: {}", url.path(), status, body);
        }
        response
            .json()
            .await
            .with_context(|| format!("decoding response of GET {}", url.path()))
    }
}

#[async_trait]
impl RemoteApi for DiscordClient {
    async fn guilds(&self) -> Result<Vec<Guild>> {
        let guilds: Vec<WireGuild> = self.get(&["users", "@me", "guilds"], &[]).await?;
        Ok(guilds
            .into_iter()
            .map(|g| Guild {
                id: g.id,
                name: g.name,
            })
            .collect())
    }

    async fn members(&self, guild_id: &Snowflake) -> Result<Vec<GuildMember>> {
        let members = page_after(MEMBERS_PAGE_LIMIT, WireMember::id, |after| async move {
            self.get::<Vec<WireMember>>(
                &["guilds", guild_id.as_str(), "members"],
                &[
                    ("limit", MEMBERS_PAGE_LIMIT.to_string()),
                    ("after", after.to_string()),
                ],
            )
            .await
        })
        .await?;
        Ok(members.into_iter().map(WireMember::into_member).collect())
    }

    async fn channels(&self, guild_id: &Snowflake) -> Result<Vec<Channel>> {
        let channels: Vec<WireChannel> = self.get(&["guilds", guild_id.as_str(), "channels"], &[]).await?;
        Ok(channels.into_iter().map(WireChannel::into_channel).collect())
    }

    async fn messages(
        &self,
        channel_id: &Snowflake,
        after: &Snowflake,
        limit: usize,
    ) -> Result<Vec<Message>> {
        // Fill `limit` from several requests when it exceeds the endpoint cap.
        let mut messages: Vec<Message> = Vec::new();
        let mut cursor = after.clone();
        while messages.len() < limit {
            let want = (limit - messages.len()).min(MESSAGES_PAGE_LIMIT);
            let page: Vec<WireMessage> = self
                .get(
                    &["channels", channel_id.as_str(), "messages"],
                    &[("after", cursor.to_string()), ("limit", want.to_string())],
                )
                .await?;
            let page_len = page.len();
            let mut page = page
                .into_iter()
                .map(WireMessage::into_message)
                .collect::<Result<Vec<_>>>()?;
            page.sort_by(|a, b| a.id.cmp(&b.id));
            if let Some(last) = page.last() {
                cursor = last.id.clone();
            }
            messages.extend(page);
            if page_len < want {
                break;
            }
        }
        Ok(messages)
    }

    async fn reactions(
        &self,
        channel_id: &Snowflake,
        message_id: &Snowflake,
        emoji: &Emoji,
    ) -> Result<Vec<Snowflake>> {
        let emoji_ref = emoji.to_ref();
        let emoji_ref = emoji_ref.as_str();
        let users = page_after(REACTIONS_PAGE_LIMIT, WireUser::id, |after| async move {
            self.get::<Vec<WireUser>>(
                &[
                    "channels",
                    channel_id.as_str(),
                    "messages",
                    message_id.as_str(),
                    "reactions",
                    emoji_ref,
                ],
                &[
                    ("limit", REACTIONS_PAGE_LIMIT.to_string()),
                    ("after", after.to_string()),
                ],
            )
            .await
        })
        .await?;
        Ok(users.into_iter().map(|u| u.id).collect())
    }
}

/// Walk an `after`-cursored list endpoint until it returns a short page.
///
/// The cursor is the largest id seen so far, so pages may arrive in any order.
async fn page_after<T, I, F, Fut>(limit: usize, id_of: I, mut fetch: F) -> Result<Vec<T>>
where
    I: Fn(&T) -> &Snowflake,
    F: FnMut(Snowflake) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut items = Vec::new();
    let mut after = Snowflake::min();
    loop {
        let page = fetch(after.clone()).await?;
        let page_len = page.len();
        let previous = after.clone();
        for item in page {
            if *id_of(&item) > after {
                after = id_of(&item).clone();
            }
            items.push(item);
        }
        if page_len < limit {
            return Ok(items);
        }
        if after == previous {
            bail!("paging stalled after {after}");
        }
    }
}

// -- Wire types --

#[derive(Debug, Deserialize)]
struct WireGuild {
    id: Snowflake,
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: Snowflake,
    username: String,
    #[serde(default)]
    discriminator: Option<String>,
    #[serde(default)]
    bot: bool,
}

impl WireUser {
    fn id(&self) -> &Snowflake {
        &self.id
    }

    fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            discriminator: self.discriminator.unwrap_or_else(|| "0".to_string()),
            bot: self.bot,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireMember {
    user: WireUser,
    #[serde(default)]
    nick: Option<String>,
}

impl WireMember {
    fn id(&self) -> &Snowflake {
        &self.user.id
    }

    fn into_member(self) -> GuildMember {
        GuildMember {
            user: self.user.into_user(),
            nick: self.nick,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: Snowflake,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    name: Option<String>,
}

impl WireChannel {
    fn into_channel(self) -> Channel {
        let kind = match self.kind {
            0 => ChannelKind::Text,
            2 => ChannelKind::Voice,
            4 => ChannelKind::Category,
            _ => ChannelKind::Other,
        };
        Channel {
            id: self.id,
            name: self.name.unwrap_or_default(),
            kind,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireEmoji {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireReaction {
    emoji: WireEmoji,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: Snowflake,
    channel_id: Snowflake,
    author: WireUser,
    timestamp: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    reactions: Vec<WireReaction>,
    #[serde(default)]
    webhook_id: Option<String>,
    #[serde(default)]
    mentions: Vec<WireUser>,
}

impl WireMessage {
    fn into_message(self) -> Result<Message> {
        let timestamp_ms = chrono::DateTime::parse_from_rfc3339(&self.timestamp)
            .with_context(|| format!("message {} has bad timestamp {:?}", self.id, self.timestamp))?
            .timestamp_millis();

        // Emoji deleted from the guild come back without a name.
        let reaction_emoji = self
            .reactions
            .into_iter()
            .filter_map(|r| match r.emoji.name {
                Some(name) if !name.is_empty() => Some(Emoji { id: r.emoji.id, name }),
                _ => None,
            })
            .collect();

        Ok(Message {
            id: self.id,
            channel_id: self.channel_id,
            author_id: self.author.id,
            timestamp_ms,
            content: self.content,
            reaction_emoji,
            non_user_author: self.webhook_id.is_some(),
            mentions: self.mentions.into_iter().map(|u| u.id).collect(),
        })
    }
}

//! The remote platform as the engine sees it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use mirror_types::{Channel, Emoji, Guild, GuildMember, Message, Reaction, Snowflake};

/// Read-only capabilities the sync engine needs from the remote platform.
///
/// Implementations own transport concerns (auth, retries, rate limits).
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Guilds the caller can access.
    async fn guilds(&self) -> Result<Vec<Guild>>;

    /// Every member of the guild.
    async fn members(&self, guild_id: &Snowflake) -> Result<Vec<GuildMember>>;

    /// Every channel of the guild, of any kind.
    async fn channels(&self, guild_id: &Snowflake) -> Result<Vec<Channel>>;

    /// Up to `limit` messages with ids strictly greater than `after`,
    /// in ascending id order.
    async fn messages(
        &self,
        channel_id: &Snowflake,
        after: &Snowflake,
        limit: usize,
    ) -> Result<Vec<Message>>;

    /// Ids of the users who reacted to the message with `emoji`.
    async fn reactions(
        &self,
        channel_id: &Snowflake,
        message_id: &Snowflake,
        emoji: &Emoji,
    ) -> Result<Vec<Snowflake>>;
}

#[async_trait]
impl<T: RemoteApi + ?Sized> RemoteApi for Arc<T> {
    async fn guilds(&self) -> Result<Vec<Guild>> {
        (**self).guilds().await
    }

    async fn members(&self, guild_id: &Snowflake) -> Result<Vec<GuildMember>> {
        (**self).members(guild_id).await
    }

    async fn channels(&self, guild_id: &Snowflake) -> Result<Vec<Channel>> {
        (**self).channels(guild_id).await
    }

    async fn messages(
        &self,
        channel_id: &Snowflake,
        after: &Snowflake,
        limit: usize,
    ) -> Result<Vec<Message>> {
        (**self).messages(channel_id, after, limit).await
    }

    async fn reactions(
        &self,
        channel_id: &Snowflake,
        message_id: &Snowflake,
        emoji: &Emoji,
    ) -> Result<Vec<Snowflake>> {
        (**self).reactions(channel_id, message_id, emoji).await
    }
}

/// One `messages` call as seen by a [`MemoryRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagesRequest {
    pub channel_id: Snowflake,
    pub after: Snowflake,
    pub limit: usize,
}

#[derive(Default)]
struct MemoryState {
    guilds: Vec<Guild>,
    members: Vec<GuildMember>,
    channels: Vec<Channel>,
    messages: HashMap<Snowflake, BTreeMap<Snowflake, Message>>,
    reactions: HashMap<(Snowflake, String), Vec<Snowflake>>,
    failing_channels: HashSet<Snowflake>,
    requests: Vec<MessagesRequest>,
}

/// An in-memory remote for tests and offline runs.
///
/// Serves one guild's data from memory, records every `messages` request,
/// and can be told to fail specific channels.
#[derive(Default)]
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_guild(&self, guild: Guild) {
        self.state().guilds.push(guild);
    }

    pub fn add_member(&self, member: GuildMember) {
        let mut state = self.state();
        state.members.retain(|m| m.user.id != member.user.id);
        state.members.push(member);
    }

    pub fn add_channel(&self, channel: Channel) {
        self.state().channels.push(channel);
    }

    /// Adds or replaces a message. Its `reaction_emoji` is kept as given.
    pub fn add_message(&self, message: Message) {
        self.state()
            .messages
            .entry(message.channel_id.clone())
            .or_default()
            .insert(message.id.clone(), message);
    }

    /// Records a reaction and lists its emoji on the message if it is new there.
    pub fn add_reaction(&self, reaction: Reaction) {
        let mut state = self.state();
        if let Some(message) = state
            .messages
            .get_mut(&reaction.channel_id)
            .and_then(|channel| channel.get_mut(&reaction.message_id))
        {
            if !message.reaction_emoji.contains(&reaction.emoji) {
                message.reaction_emoji.push(reaction.emoji.clone());
            }
        }
        let users = state
            .reactions
            .entry((reaction.message_id.clone(), reaction.emoji.to_ref()))
            .or_default();
        if !users.contains(&reaction.author_id) {
            users.push(reaction.author_id);
        }
    }

    /// Make every `messages` and `reactions` call for this channel fail.
    pub fn fail_channel(&self, channel_id: Snowflake) {
        self.state().failing_channels.insert(channel_id);
    }

    pub fn heal_channel(&self, channel_id: &Snowflake) {
        self.state().failing_channels.remove(channel_id);
    }

    pub fn message_requests(&self) -> Vec<MessagesRequest> {
        self.state().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.state().requests.clear();
    }
}

#[async_trait]
impl RemoteApi for MemoryRemote {
    async fn guilds(&self) -> Result<Vec<Guild>> {
        Ok(self.state().guilds.clone())
    }

    async fn members(&self, _guild_id: &Snowflake) -> Result<Vec<GuildMember>> {
        Ok(self.state().members.clone())
    }

    async fn channels(&self, _guild_id: &Snowflake) -> Result<Vec<Channel>> {
        Ok(self.state().channels.clone())
    }

    async fn messages(
        &self,
        channel_id: &Snowflake,
        after: &Snowflake,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let mut state = self.state();
        state.requests.push(MessagesRequest {
            channel_id: channel_id.clone(),
            after: after.clone(),
            limit,
        });
        if state.failing_channels.contains(channel_id) {
            bail!("channel {channel_id} is unavailable");
        }
        let page: Vec<Message> = state
            .messages
            .get(channel_id)
            .map(|messages| {
                messages
                    .values()
                    .filter(|m| m.id > *after)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(page)
    }

    async fn reactions(
        &self,
        channel_id: &Snowflake,
        message_id: &Snowflake,
        emoji: &Emoji,
    ) -> Result<Vec<Snowflake>> {
        let state = self.state();
        if state.failing_channels.contains(channel_id) {
            return Err(anyhow!("channel {channel_id} is unavailable"));
        }
        Ok(state
            .reactions
            .get(&(message_id.clone(), emoji.to_ref()))
            .cloned()
            .unwrap_or_default())
    }
}

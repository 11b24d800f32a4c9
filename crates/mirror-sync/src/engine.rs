use std::sync::{Arc, Mutex};

use mirror_db::{LocalStore, StoreResult};
use mirror_types::{Channel, ChannelKind, Guild, Message, Reaction, Snowflake};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteApi;
use crate::reporter::StatusReporter;

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    NotStarted,
    ValidatingGuild,
    SyncingMembers,
    SyncingChannels,
    SyncingMessages { channel_id: Snowflake },
    Done,
    /// Guild validation or member/channel refresh failed.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    /// Number of messages mirrored for the channel after the run.
    Synced { messages: usize },
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct ChannelReport {
    pub channel: Channel,
    pub outcome: ChannelOutcome,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub guild: Guild,
    pub members: usize,
    pub channels: Vec<ChannelReport>,
}

impl SyncReport {
    pub fn failed_channels(&self) -> impl Iterator<Item = &ChannelReport> {
        self.channels
            .iter()
            .filter(|c| matches!(c.outcome, ChannelOutcome::Failed { .. }))
    }
}

/// Mirrors one guild from a [`RemoteApi`] into a [`LocalStore`].
///
/// All work is sequential: one remote call or store write at a time.
pub struct SyncEngine<R> {
    remote: R,
    store: Arc<LocalStore>,
    config: SyncConfig,
    phase: Mutex<SyncPhase>,
}

impl<R: RemoteApi> SyncEngine<R> {
    pub fn new(remote: R, store: Arc<LocalStore>, config: SyncConfig) -> Self {
        Self {
            remote,
            store,
            config,
            phase: Mutex::new(SyncPhase::NotStarted),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    /// Run a store operation on the blocking pool and wait for it.
    async fn with_store<F, T>(&self, f: F) -> SyncResult<T>
    where
        F: FnOnce(&LocalStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| SyncError::Join(e.to_string()))?;
        Ok(result?)
    }

    /// Find the configured guild among those the remote lets us see.
    pub async fn validate_guild(&self) -> SyncResult<Guild> {
        let guilds = self.remote.guilds().await.map_err(SyncError::Remote)?;
        guilds
            .into_iter()
            .find(|g| g.id == self.config.guild_id)
            .ok_or_else(|| SyncError::GuildNotFound {
                guild_id: self.config.guild_id.clone(),
            })
    }

    /// Upsert every current member. Members who left are kept.
    pub async fn sync_members(&self) -> SyncResult<usize> {
        let members = self
            .remote
            .members(&self.config.guild_id)
            .await
            .map_err(SyncError::Remote)?;
        let count = self
            .with_store(move |store| {
                for member in &members {
                    store.add_member(member)?;
                }
                Ok(members.len())
            })
            .await?;
        info!("Mirrored {} members", count);
        Ok(count)
    }

    /// Upsert the guild's text channels and return them; other kinds are skipped.
    pub async fn sync_channels(&self) -> SyncResult<Vec<Channel>> {
        let channels: Vec<Channel> = self
            .remote
            .channels(&self.config.guild_id)
            .await
            .map_err(SyncError::Remote)?
            .into_iter()
            .filter(|c| c.kind == ChannelKind::Text)
            .collect();
        let stored = channels.clone();
        self.with_store(move |store| {
            for channel in &stored {
                store.add_channel(channel)?;
            }
            Ok(())
        })
        .await?;
        info!("Mirrored {} text channels", channels.len());
        Ok(channels)
    }

    /// Sync one channel with the configured page size and reload window.
    pub async fn sync_messages(&self, channel_id: &Snowflake) -> SyncResult<Vec<Message>> {
        self.sync_messages_with(channel_id, self.config.page_size, self.config.reload_window)
            .await
    }

    /// Page forward from `reload_window` messages behind the newest mirrored
    /// one (or from the start), storing messages, mentions and reactions.
    /// Returns the channel's full mirrored history.
    pub async fn sync_messages_with(
        &self,
        channel_id: &Snowflake,
        page_size: usize,
        reload_window: usize,
    ) -> SyncResult<Vec<Message>> {
        let page_size = page_size.max(1);

        let resume = {
            let channel_id = channel_id.clone();
            self.with_store(move |store| store.nth_message_id_from_tail(&channel_id, reload_window))
                .await?
        };
        let mut after = resume.unwrap_or_else(Snowflake::min);
        debug!("Channel {}: resuming after message {}", channel_id, after);

        loop {
            let page = self
                .remote
                .messages(channel_id, &after, page_size)
                .await
                .map_err(SyncError::Remote)?;
            let page_len = page.len();
            let previous = after.clone();

            for message in page {
                if message.id > after {
                    after = message.id.clone();
                }
                self.store_message(message).await?;
            }
            debug!("Channel {}: stored page of {} messages", channel_id, page_len);

            if page_len < page_size {
                break;
            }
            if after == previous {
                return Err(SyncError::Stalled {
                    channel_id: channel_id.clone(),
                    after,
                });
            }
        }

        let channel_id = channel_id.clone();
        self.with_store(move |store| store.messages(&channel_id)).await
    }

    async fn store_message(&self, message: Message) -> SyncResult<()> {
        let emoji = message.reaction_emoji.clone();
        let channel_id = message.channel_id.clone();
        let message_id = message.id.clone();

        self.with_store(move |store| {
            store.add_message(&message)?;
            for user_id in &message.mentions {
                store.add_mention(&message, user_id)?;
            }
            Ok(())
        })
        .await?;

        for emoji in emoji {
            let authors = self
                .remote
                .reactions(&channel_id, &message_id, &emoji)
                .await
                .map_err(SyncError::Remote)?;
            let reactions: Vec<Reaction> = authors
                .into_iter()
                .map(|author_id| Reaction {
                    emoji: emoji.clone(),
                    channel_id: channel_id.clone(),
                    message_id: message_id.clone(),
                    author_id,
                })
                .collect();
            self.with_store(move |store| {
                for reaction in &reactions {
                    store.add_reaction(reaction)?;
                }
                Ok(())
            })
            .await?;
        }
        Ok(())
    }

    /// Full run: validate the guild, refresh members and channels, then sync
    /// every text channel. A failing channel is logged and recorded in the
    /// report; the run moves on to the next one.
    pub async fn update(&self, reporter: &mut dyn StatusReporter) -> SyncResult<SyncReport> {
        self.set_phase(SyncPhase::ValidatingGuild);
        let guild = match self.validate_guild().await {
            Ok(guild) => guild,
            Err(e) => {
                self.set_phase(SyncPhase::Aborted);
                return Err(e);
            }
        };

        let guild_label = format!("{}/{}", self.config.plugin_label, guild.name);
        reporter.start(&guild_label);
        let result = self.update_guild(guild, &guild_label, reporter).await;
        reporter.finish(&guild_label);

        self.set_phase(if result.is_ok() {
            SyncPhase::Done
        } else {
            SyncPhase::Aborted
        });
        result
    }

    async fn update_guild(
        &self,
        guild: Guild,
        guild_label: &str,
        reporter: &mut dyn StatusReporter,
    ) -> SyncResult<SyncReport> {
        self.set_phase(SyncPhase::SyncingMembers);
        let members = self.sync_members().await?;

        self.set_phase(SyncPhase::SyncingChannels);
        let channels = self.sync_channels().await?;

        let mut reports = Vec::with_capacity(channels.len());
        for channel in channels {
            self.set_phase(SyncPhase::SyncingMessages {
                channel_id: channel.id.clone(),
            });
            let label = format!("{}/#{}", guild_label, channel.name);
            reporter.start(&label);
            let outcome = match self.sync_messages(&channel.id).await {
                Ok(messages) => ChannelOutcome::Synced {
                    messages: messages.len(),
                },
                Err(e) => {
                    warn!("Failed to sync channel #{} ({}): {}", channel.name, channel.id, e);
                    ChannelOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            reporter.finish(&label);
            reports.push(ChannelReport { channel, outcome });
        }

        Ok(SyncReport {
            guild,
            members,
            channels: reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, MessagesRequest};
    use crate::reporter::{RecordingReporter, ReporterEvent};
    use async_trait::async_trait;
    use mirror_types::{Emoji, GuildMember, User};
    use std::collections::VecDeque;

    fn sf(id: u64) -> Snowflake {
        Snowflake::from(id)
    }

    const GUILD: u64 = 1000;
    const CHANNEL: u64 = 2000;
    const AUTHOR: u64 = 3000;

    fn member(id: u64) -> GuildMember {
        GuildMember {
            user: User {
                id: sf(id),
                username: format!("user{id}"),
                discriminator: "0".into(),
                bot: false,
            },
            nick: None,
        }
    }

    fn text_channel(id: u64, name: &str) -> Channel {
        Channel {
            id: sf(id),
            name: name.into(),
            kind: ChannelKind::Text,
        }
    }

    fn message(id: u64, channel_id: u64) -> Message {
        Message {
            id: sf(id),
            channel_id: sf(channel_id),
            author_id: sf(AUTHOR),
            timestamp_ms: id as i64,
            content: format!("message {id}"),
            reaction_emoji: vec![],
            non_user_author: false,
            mentions: vec![],
        }
    }

    fn remote() -> MemoryRemote {
        let remote = MemoryRemote::new();
        remote.add_guild(Guild {
            id: sf(GUILD),
            name: "SourceCred".into(),
        });
        remote.add_member(member(AUTHOR));
        remote.add_channel(text_channel(CHANNEL, "general"));
        remote
    }

    fn engine(remote: MemoryRemote) -> SyncEngine<MemoryRemote> {
        let store = Arc::new(LocalStore::open_in_memory(sf(GUILD)).unwrap());
        SyncEngine::new(remote, store, SyncConfig::new(sf(GUILD)))
    }

    async fn prepared(remote: MemoryRemote) -> SyncEngine<MemoryRemote> {
        let engine = engine(remote);
        engine.sync_members().await.unwrap();
        engine.sync_channels().await.unwrap();
        engine
    }

    #[tokio::test]
    async fn missing_guild_aborts_before_any_write() {
        let remote = MemoryRemote::new();
        remote.add_member(member(AUTHOR));
        let engine = engine(remote);
        let mut reporter = RecordingReporter::new();

        let err = engine.update(&mut reporter).await.unwrap_err();
        assert!(matches!(err, SyncError::GuildNotFound { .. }));
        assert_eq!(engine.phase(), SyncPhase::Aborted);
        assert!(reporter.events().is_empty());
        assert!(engine.store().users().unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_text_channels_are_mirrored() {
        let remote = remote();
        remote.add_channel(Channel {
            id: sf(2001),
            name: "voice".into(),
            kind: ChannelKind::Voice,
        });
        remote.add_channel(Channel {
            id: sf(2002),
            name: "topics".into(),
            kind: ChannelKind::Category,
        });
        let engine = engine(remote);

        let channels = engine.sync_channels().await.unwrap();
        assert_eq!(channels, vec![text_channel(CHANNEL, "general")]);
        assert_eq!(engine.store().channels().unwrap(), channels);
    }

    #[tokio::test]
    async fn fresh_channel_is_fetched_from_the_start() {
        let remote = remote();
        for id in 1..=5 {
            remote.add_message(message(id, CHANNEL));
        }
        let engine = prepared(remote).await;

        let messages = engine
            .sync_messages_with(&sf(CHANNEL), 2, 50)
            .await
            .unwrap();
        assert_eq!(messages.len(), 5);

        let afters: Vec<String> = engine
            .remote()
            .message_requests()
            .into_iter()
            .map(|r| r.after.to_string())
            .collect();
        assert_eq!(afters, ["0", "2", "4"]);
    }

    #[tokio::test]
    async fn resumes_reload_window_behind_the_tail() {
        let remote = remote();
        for id in 1..=60 {
            remote.add_message(message(id, CHANNEL));
        }
        let engine = prepared(remote).await;
        engine.sync_messages(&sf(CHANNEL)).await.unwrap();
        engine.remote().clear_requests();

        let expected = engine
            .store()
            .nth_message_id_from_tail(&sf(CHANNEL), 50)
            .unwrap()
            .unwrap();
        assert_eq!(expected, sf(10));

        engine.sync_messages(&sf(CHANNEL)).await.unwrap();
        assert_eq!(
            engine.remote().message_requests(),
            vec![MessagesRequest {
                channel_id: sf(CHANNEL),
                after: expected,
                limit: 100,
            }]
        );
    }

    /// Serves `messages` from a fixed list of pages and everything else from
    /// an inner [`MemoryRemote`].
    struct ScriptedRemote {
        inner: MemoryRemote,
        pages: Mutex<VecDeque<Vec<u64>>>,
        afters: Mutex<Vec<String>>,
    }

    impl ScriptedRemote {
        fn new(pages: Vec<Vec<u64>>) -> Self {
            Self {
                inner: remote(),
                pages: Mutex::new(pages.into()),
                afters: Mutex::new(Vec::new()),
            }
        }

        fn afters(&self) -> Vec<String> {
            self.afters.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteApi for ScriptedRemote {
        async fn guilds(&self) -> anyhow::Result<Vec<Guild>> {
            self.inner.guilds().await
        }

        async fn members(&self, guild_id: &Snowflake) -> anyhow::Result<Vec<GuildMember>> {
            self.inner.members(guild_id).await
        }

        async fn channels(&self, guild_id: &Snowflake) -> anyhow::Result<Vec<Channel>> {
            self.inner.channels(guild_id).await
        }

        async fn messages(
            &self,
            channel_id: &Snowflake,
            after: &Snowflake,
            _limit: usize,
        ) -> anyhow::Result<Vec<Message>> {
            self.afters.lock().unwrap().push(after.to_string());
            let ids = self.pages.lock().unwrap().pop_front().unwrap_or_default();
            Ok(ids
                .into_iter()
                .map(|id| message(id, CHANNEL))
                .filter(|m| m.channel_id == *channel_id)
                .collect())
        }

        async fn reactions(
            &self,
            channel_id: &Snowflake,
            message_id: &Snowflake,
            emoji: &Emoji,
        ) -> anyhow::Result<Vec<Snowflake>> {
            self.inner.reactions(channel_id, message_id, emoji).await
        }
    }

    async fn scripted(pages: Vec<Vec<u64>>) -> SyncEngine<ScriptedRemote> {
        let store = Arc::new(LocalStore::open_in_memory(sf(GUILD)).unwrap());
        let engine = SyncEngine::new(ScriptedRemote::new(pages), store, SyncConfig::new(sf(GUILD)));
        engine.sync_members().await.unwrap();
        engine.sync_channels().await.unwrap();
        engine
    }

    #[tokio::test]
    async fn cursor_takes_the_largest_id_of_an_unordered_page() {
        let engine = scripted(vec![vec![3, 2], vec![1]]).await;

        let messages = engine
            .sync_messages_with(&sf(CHANNEL), 2, 50)
            .await
            .unwrap();
        assert_eq!(engine.remote().afters(), ["0", "3"]);
        let ids: Vec<_> = messages.iter().map(|m| m.id.to_string()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }

    #[tokio::test]
    async fn full_page_behind_the_cursor_is_stalled() {
        let engine = scripted(vec![vec![3, 4], vec![1, 2]]).await;

        let err = engine
            .sync_messages_with(&sf(CHANNEL), 2, 50)
            .await
            .unwrap_err();
        match err {
            SyncError::Stalled { channel_id, after } => {
                assert_eq!(channel_id, sf(CHANNEL));
                assert_eq!(after, sf(4));
            }
            other => panic!("expected stall, got {other:?}"),
        }
        assert_eq!(engine.remote().afters(), ["0", "4"]);
    }

    #[tokio::test]
    async fn window_sized_channel_is_refetched_in_full() {
        let remote = remote();
        for id in 1..=50 {
            remote.add_message(message(id, CHANNEL));
        }
        let engine = prepared(remote).await;
        engine.sync_messages(&sf(CHANNEL)).await.unwrap();
        engine.remote().clear_requests();

        engine.sync_messages(&sf(CHANNEL)).await.unwrap();
        assert_eq!(engine.remote().message_requests()[0].after, Snowflake::min());

        // One more message puts the oldest one outside the window.
        engine.remote().add_message(message(51, CHANNEL));
        engine.sync_messages(&sf(CHANNEL)).await.unwrap();
        engine.remote().clear_requests();
        engine.sync_messages(&sf(CHANNEL)).await.unwrap();
        assert_eq!(engine.remote().message_requests()[0].after, sf(1));
    }

    #[tokio::test]
    async fn short_non_empty_page_ends_paging() {
        let remote = remote();
        for id in 1..=3 {
            remote.add_message(message(id, CHANNEL));
        }
        let engine = prepared(remote).await;
        engine
            .sync_messages_with(&sf(CHANNEL), 10, 50)
            .await
            .unwrap();
        assert_eq!(engine.remote().message_requests().len(), 1);
    }

    #[tokio::test]
    async fn reactions_and_mentions_are_stored() {
        let remote = remote();
        remote.add_member(member(AUTHOR + 1));
        let mut msg = message(1, CHANNEL);
        msg.mentions = vec![sf(AUTHOR + 1)];
        remote.add_message(msg);
        let thumbs = Emoji::generic("👍");
        let custom = Emoji::custom("cred", "77");
        for (emoji, author) in [(&thumbs, AUTHOR), (&custom, AUTHOR + 1), (&thumbs, AUTHOR + 1)] {
            remote.add_reaction(Reaction {
                emoji: emoji.clone(),
                channel_id: sf(CHANNEL),
                message_id: sf(1),
                author_id: sf(author),
            });
        }
        let engine = prepared(remote).await;

        let messages = engine.sync_messages(&sf(CHANNEL)).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].reaction_emoji, vec![thumbs.clone(), custom]);
        assert_eq!(messages[0].mentions, vec![sf(AUTHOR + 1)]);
        assert_eq!(
            engine.store().reactions(&sf(CHANNEL), &sf(1)).unwrap().len(),
            3
        );

        // A second run refetches the window without duplicating rows.
        engine.sync_messages(&sf(CHANNEL)).await.unwrap();
        assert_eq!(
            engine.store().reactions(&sf(CHANNEL), &sf(1)).unwrap().len(),
            3
        );
        assert_eq!(
            engine.store().mentions(&sf(CHANNEL), &sf(1)).unwrap(),
            vec![sf(AUTHOR + 1)]
        );
    }

    #[tokio::test]
    async fn webhook_messages_need_no_user() {
        let remote = remote();
        remote.add_message(Message {
            author_id: sf(9999),
            non_user_author: true,
            ..message(1, CHANNEL)
        });
        let engine = prepared(remote).await;
        let messages = engine.sync_messages(&sf(CHANNEL)).await.unwrap();
        assert!(messages[0].non_user_author);
        assert_eq!(engine.store().user(&sf(9999)).unwrap(), None);
    }

    #[tokio::test]
    async fn failed_channel_does_not_stop_the_run() {
        let remote = remote();
        remote.add_channel(text_channel(2001, "broken"));
        remote.add_channel(text_channel(2002, "random"));
        remote.add_message(message(1, CHANNEL));
        remote.add_message(message(2, 2002));
        remote.fail_channel(sf(2001));
        let engine = engine(remote);
        let mut reporter = RecordingReporter::new();

        let report = engine.update(&mut reporter).await.unwrap();
        assert_eq!(engine.phase(), SyncPhase::Done);
        assert_eq!(report.members, 1);
        assert_eq!(report.channels.len(), 3);
        assert_eq!(
            report.channels[0].outcome,
            ChannelOutcome::Synced { messages: 1 }
        );
        assert!(matches!(
            report.channels[1].outcome,
            ChannelOutcome::Failed { .. }
        ));
        assert_eq!(
            report.channels[2].outcome,
            ChannelOutcome::Synced { messages: 1 }
        );
        assert_eq!(report.failed_channels().count(), 1);

        assert!(reporter.is_balanced());
        assert_eq!(
            reporter.events()[..3],
            [
                ReporterEvent::Start("discord/SourceCred".into()),
                ReporterEvent::Start("discord/SourceCred/#general".into()),
                ReporterEvent::Finish("discord/SourceCred/#general".into()),
            ]
        );
        assert_eq!(
            reporter.events().last(),
            Some(&ReporterEvent::Finish("discord/SourceCred".into()))
        );
    }

    #[tokio::test]
    async fn message_with_unknown_author_fails_only_its_channel() {
        let remote = remote();
        remote.add_message(Message {
            author_id: sf(4242),
            ..message(1, CHANNEL)
        });
        let engine = engine(remote);
        let mut reporter = RecordingReporter::new();

        let report = engine.update(&mut reporter).await.unwrap();
        match &report.channels[0].outcome {
            ChannelOutcome::Failed { error } => assert!(error.contains("4242")),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}

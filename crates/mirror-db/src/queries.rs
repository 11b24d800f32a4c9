use crate::models::{
    ChannelRow, MemberRow, MessageRow, ReactionRow, UserRow, decode_id, encode_bool,
};
use crate::{LocalStore, OptionalExt, StoreError, StoreResult};
use mirror_types::{Channel, Emoji, GuildMember, Message, Reaction, Snowflake, User};
use rusqlite::{Connection, params};

impl LocalStore {
    // -- Users & members --

    pub fn add_user(&self, user: &User) -> StoreResult<()> {
        self.with_conn(|conn| upsert_user(conn, user))
    }

    /// Upserts the embedded user first, then the member row keyed by user id.
    pub fn add_member(&self, member: &GuildMember) -> StoreResult<()> {
        self.with_conn(|conn| {
            upsert_user(conn, &member.user)?;
            conn.execute(
                "INSERT INTO members (user_id, nick) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET nick = excluded.nick",
                params![member.user.id.as_str(), member.nick],
            )?;
            Ok(())
        })
    }

    pub fn user(&self, id: &Snowflake) -> StoreResult<Option<User>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    pub fn member(&self, id: &Snowflake) -> StoreResult<Option<GuildMember>> {
        self.with_conn(|conn| query_member(conn, id))
    }

    pub fn users(&self) -> StoreResult<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, discriminator, bot FROM users ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map([], user_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(UserRow::into_user).collect()
        })
    }

    pub fn members(&self) -> StoreResult<Vec<GuildMember>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.discriminator, u.bot, m.nick
                 FROM members m
                 JOIN users u ON u.id = m.user_id
                 ORDER BY m.rowid",
            )?;
            let rows = stmt
                .query_map([], member_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(MemberRow::into_member).collect()
        })
    }

    // -- Channels --

    pub fn add_channel(&self, channel: &Channel) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channels (id, type, name) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET type = excluded.type, name = excluded.name",
                params![channel.id.as_str(), channel.kind.as_str(), channel.name],
            )?;
            Ok(())
        })
    }

    pub fn channels(&self) -> StoreResult<Vec<Channel>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, type, name FROM channels ORDER BY rowid")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(ChannelRow {
                        id: row.get(0)?,
                        kind: row.get(1)?,
                        name: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(ChannelRow::into_channel).collect()
        })
    }

    // -- Messages --

    /// Upsert the message row. `reaction_emoji` and `mentions` are not stored
    /// here; they come from [`add_reaction`](Self::add_reaction) and
    /// [`add_mention`](Self::add_mention).
    pub fn add_message(&self, message: &Message) -> StoreResult<()> {
        self.with_conn(|conn| {
            if !row_exists(conn, "SELECT 1 FROM channels WHERE id = ?1", message.channel_id.as_str())? {
                return Err(StoreError::UnknownChannel {
                    message_id: message.id.to_string(),
                    channel_id: message.channel_id.to_string(),
                });
            }
            if !message.non_user_author
                && !row_exists(conn, "SELECT 1 FROM users WHERE id = ?1", message.author_id.as_str())?
            {
                return Err(StoreError::UnknownAuthor {
                    message_id: message.id.to_string(),
                    author_id: message.author_id.to_string(),
                });
            }

            conn.execute(
                "INSERT INTO messages (id, channel_id, author_id, non_user_author, timestamp_ms, content)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    channel_id = excluded.channel_id,
                    author_id = excluded.author_id,
                    non_user_author = excluded.non_user_author,
                    timestamp_ms = excluded.timestamp_ms,
                    content = excluded.content",
                params![
                    message.id.as_str(),
                    message.channel_id.as_str(),
                    message.author_id.as_str(),
                    encode_bool(message.non_user_author),
                    message.timestamp_ms,
                    message.content,
                ],
            )?;
            Ok(())
        })
    }

    /// All messages of a channel in ascending id order, with reactions and
    /// mentions rebuilt from their tables.
    pub fn messages(&self, channel_id: &Snowflake) -> StoreResult<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, channel_id, author_id, non_user_author, timestamp_ms, content
                 FROM messages
                 WHERE channel_id = ?1
                 ORDER BY LENGTH(id), id",
            )?;
            let rows = stmt
                .query_map([channel_id.as_str()], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        channel_id: row.get(1)?,
                        author_id: row.get(2)?,
                        non_user_author: row.get(3)?,
                        timestamp_ms: row.get(4)?,
                        content: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut messages = Vec::with_capacity(rows.len());
            for row in rows {
                let message_id = decode_id("messages.id", row.id.clone())?;
                let emoji = query_reaction_emoji(conn, channel_id, &message_id)?;
                let mentions = query_mentions(conn, channel_id, &message_id)?;
                messages.push(row.into_message(emoji, mentions)?);
            }
            Ok(messages)
        })
    }

    /// Id of the message with exactly `n` newer mirrored messages in the
    /// channel, or `None` when the channel holds `n` messages or fewer.
    pub fn nth_message_id_from_tail(
        &self,
        channel_id: &Snowflake,
        n: usize,
    ) -> StoreResult<Option<Snowflake>> {
        let offset = i64::try_from(n).unwrap_or(i64::MAX);
        self.with_conn(|conn| {
            let id: Option<String> = conn
                .query_row(
                    "SELECT id FROM messages
                     WHERE channel_id = ?1
                     ORDER BY LENGTH(id) DESC, id DESC
                     LIMIT 1 OFFSET ?2",
                    params![channel_id.as_str(), offset],
                    |row| row.get(0),
                )
                .optional()?;
            id.map(|id| decode_id("messages.id", id)).transpose()
        })
    }

    pub fn message_count(&self, channel_id: &Snowflake) -> StoreResult<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE channel_id = ?1",
                [channel_id.as_str()],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
    }

    // -- Reactions & mentions --

    /// Insert-or-ignore; re-adding the same tuple is a no-op.
    pub fn add_reaction(&self, reaction: &Reaction) -> StoreResult<()> {
        if reaction.emoji.name.is_empty() {
            return Err(StoreError::InvalidEmoji {
                message_id: reaction.message_id.to_string(),
            });
        }
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO message_reactions (channel_id, message_id, author_id, emoji)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    reaction.channel_id.as_str(),
                    reaction.message_id.as_str(),
                    reaction.author_id.as_str(),
                    reaction.emoji.to_ref(),
                ],
            )?;
            Ok(())
        })
    }

    /// Insert-or-ignore; re-adding the same tuple is a no-op.
    pub fn add_mention(&self, message: &Message, user_id: &Snowflake) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO message_mentions (channel_id, message_id, user_id)
                 VALUES (?1, ?2, ?3)",
                params![
                    message.channel_id.as_str(),
                    message.id.as_str(),
                    user_id.as_str(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn reactions(
        &self,
        channel_id: &Snowflake,
        message_id: &Snowflake,
    ) -> StoreResult<Vec<Reaction>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT channel_id, message_id, author_id, emoji
                 FROM message_reactions
                 WHERE channel_id = ?1 AND message_id = ?2
                 ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map(params![channel_id.as_str(), message_id.as_str()], |row| {
                    Ok(ReactionRow {
                        channel_id: row.get(0)?,
                        message_id: row.get(1)?,
                        author_id: row.get(2)?,
                        emoji: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(ReactionRow::into_reaction).collect()
        })
    }

    pub fn mentions(
        &self,
        channel_id: &Snowflake,
        message_id: &Snowflake,
    ) -> StoreResult<Vec<Snowflake>> {
        self.with_conn(|conn| query_mentions(conn, channel_id, message_id))
    }

    /// Distinct emoji kinds on a message, ordered by their first reaction.
    pub fn reaction_emoji(
        &self,
        channel_id: &Snowflake,
        message_id: &Snowflake,
    ) -> StoreResult<Vec<Emoji>> {
        self.with_conn(|conn| query_reaction_emoji(conn, channel_id, message_id))
    }
}

fn upsert_user(conn: &Connection, user: &User) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO users (id, username, discriminator, bot) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            username = excluded.username,
            discriminator = excluded.discriminator,
            bot = excluded.bot",
        params![
            user.id.as_str(),
            user.username,
            user.discriminator,
            encode_bool(user.bot),
        ],
    )?;
    Ok(())
}

fn user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        discriminator: row.get(2)?,
        bot: row.get(3)?,
    })
}

fn member_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemberRow> {
    Ok(MemberRow {
        user: user_row(row)?,
        nick: row.get(4)?,
    })
}

fn row_exists(conn: &Connection, sql: &str, id: &str) -> StoreResult<bool> {
    Ok(conn.query_row(sql, [id], |_| Ok(())).optional()?.is_some())
}

fn query_user(conn: &Connection, id: &Snowflake) -> StoreResult<Option<User>> {
    let row = conn
        .query_row(
            "SELECT id, username, discriminator, bot FROM users WHERE id = ?1",
            [id.as_str()],
            user_row,
        )
        .optional()?;
    row.map(UserRow::into_user).transpose()
}

fn query_member(conn: &Connection, id: &Snowflake) -> StoreResult<Option<GuildMember>> {
    let row = conn
        .query_row(
            "SELECT u.id, u.username, u.discriminator, u.bot, m.nick
             FROM members m
             JOIN users u ON u.id = m.user_id
             WHERE m.user_id = ?1",
            [id.as_str()],
            member_row,
        )
        .optional()?;
    row.map(MemberRow::into_member).transpose()
}

fn query_mentions(
    conn: &Connection,
    channel_id: &Snowflake,
    message_id: &Snowflake,
) -> StoreResult<Vec<Snowflake>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM message_mentions
         WHERE channel_id = ?1 AND message_id = ?2
         ORDER BY rowid",
    )?;
    let ids = stmt
        .query_map(params![channel_id.as_str(), message_id.as_str()], |row| {
            row.get::<_, String>(0)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    ids.into_iter()
        .map(|id| decode_id("message_mentions.user_id", id))
        .collect()
}

fn query_reaction_emoji(
    conn: &Connection,
    channel_id: &Snowflake,
    message_id: &Snowflake,
) -> StoreResult<Vec<Emoji>> {
    let mut stmt = conn.prepare(
        "SELECT emoji FROM message_reactions
         WHERE channel_id = ?1 AND message_id = ?2
         GROUP BY emoji
         ORDER BY MIN(rowid)",
    )?;
    let refs = stmt
        .query_map(params![channel_id.as_str(), message_id.as_str()], |row| {
            row.get::<_, String>(0)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(refs.iter().map(|r| Emoji::from_ref(r)).collect())
}

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use mirror_db::LocalStore;
use mirror_sync::{ChannelOutcome, DiscordClient, LoggingReporter, SyncEngine};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guild_mirror=info,mirror_sync=info,mirror_db=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    // The store's fingerprint check runs before any remote call.
    let store = LocalStore::open(&config.db_path, config.sync.guild_id.clone())
        .with_context(|| format!("opening mirror at {}", config.db_path.display()))?;
    let client = DiscordClient::new(&config.api_base, config.bot_token.clone())?;

    let engine = SyncEngine::new(client, Arc::new(store), config.sync.clone());
    let mut reporter = LoggingReporter::new();
    let report = engine.update(&mut reporter).await?;

    let mut mirrored = 0;
    for channel in &report.channels {
        match &channel.outcome {
            ChannelOutcome::Synced { messages } => mirrored += messages,
            ChannelOutcome::Failed { error } => {
                warn!("#{} was not mirrored: {}", channel.channel.name, error);
            }
        }
    }
    info!(
        "Mirrored guild {}: {} members, {} channels, {} messages ({} channels failed)",
        report.guild.name,
        report.members,
        report.channels.len(),
        mirrored,
        report.failed_channels().count()
    );

    Ok(())
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use mirror_sync::SyncConfig;
use mirror_sync::discord::DEFAULT_API_BASE;
use mirror_types::Snowflake;

pub struct Config {
    pub db_path: PathBuf,
    pub api_base: String,
    pub bot_token: String,
    pub sync: SyncConfig,
}

impl Config {
    /// Read configuration from `MIRROR_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let guild_id: Snowflake = lookup("MIRROR_GUILD_ID")
            .context("MIRROR_GUILD_ID is not set")?
            .parse()
            .context("MIRROR_GUILD_ID is not a valid id")?;
        let bot_token = lookup("MIRROR_BOT_TOKEN")
            .filter(|t| !t.is_empty())
            .context("MIRROR_BOT_TOKEN is not set")?;
        let db_path: PathBuf = lookup("MIRROR_DB_PATH")
            .unwrap_or_else(|| "guild-mirror.db".into())
            .into();
        let api_base = lookup("MIRROR_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into());

        let mut sync = SyncConfig::new(guild_id);
        if let Some(page_size) = lookup("MIRROR_PAGE_SIZE") {
            sync = sync.with_page_size(
                page_size
                    .parse()
                    .context("MIRROR_PAGE_SIZE is not a number")?,
            );
        }
        if let Some(window) = lookup("MIRROR_RELOAD_WINDOW") {
            sync = sync.with_reload_window(
                window
                    .parse()
                    .context("MIRROR_RELOAD_WINDOW is not a number")?,
            );
        }

        Ok(Self {
            db_path,
            api_base,
            bot_token,
            sync,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[("MIRROR_GUILD_ID", "453243919774253079"), ("MIRROR_BOT_TOKEN", "t")])
            .unwrap();
        assert_eq!(config.db_path, PathBuf::from("guild-mirror.db"));
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.sync.page_size, 100);
        assert_eq!(config.sync.reload_window, 50);
        assert_eq!(config.sync.guild_id.as_str(), "453243919774253079");
    }

    #[test]
    fn overrides_and_errors() {
        let config = config(&[
            ("MIRROR_GUILD_ID", "1"),
            ("MIRROR_BOT_TOKEN", "t"),
            ("MIRROR_PAGE_SIZE", "20"),
            ("MIRROR_RELOAD_WINDOW", "5"),
            ("MIRROR_DB_PATH", "/tmp/m.db"),
        ])
        .unwrap();
        assert_eq!(config.sync.page_size, 20);
        assert_eq!(config.sync.reload_window, 5);
        assert_eq!(config.db_path, PathBuf::from("/tmp/m.db"));

        assert!(config_err(&[("MIRROR_BOT_TOKEN", "t")]).contains("MIRROR_GUILD_ID"));
        assert!(config_err(&[("MIRROR_GUILD_ID", "x1"), ("MIRROR_BOT_TOKEN", "t")])
            .contains("not a valid id"));
        assert!(config_err(&[("MIRROR_GUILD_ID", "1")]).contains("MIRROR_BOT_TOKEN"));
    }

    fn config_err(vars: &[(&str, &str)]) -> String {
        match config(vars) {
            Ok(_) => panic!("expected an error"),
            Err(e) => e.to_string(),
        }
    }
}

//! Configuration for the sync engine.

use mirror_types::Snowflake;

/// Messages requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;
/// Newest mirrored messages refetched on every run.
pub const DEFAULT_RELOAD_WINDOW: usize = 50;
pub const DEFAULT_PLUGIN_LABEL: &str = "discord";

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Guild to mirror; must match the store's fingerprint.
    pub guild_id: Snowflake,
    pub page_size: usize,
    pub reload_window: usize,
    /// Leading component of progress labels.
    pub plugin_label: String,
}

impl SyncConfig {
    pub fn new(guild_id: Snowflake) -> Self {
        Self {
            guild_id,
            page_size: DEFAULT_PAGE_SIZE,
            reload_window: DEFAULT_RELOAD_WINDOW,
            plugin_label: DEFAULT_PLUGIN_LABEL.to_string(),
        }
    }

    /// Page sizes below one are raised to one.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_reload_window(mut self, reload_window: usize) -> Self {
        self.reload_window = reload_window;
        self
    }

    pub fn with_plugin_label(mut self, label: impl Into<String>) -> Self {
        self.plugin_label = label.into();
        self
    }
}

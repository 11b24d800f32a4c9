use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between name and id in a custom emoji reference.
pub const EMOJI_REF_SEPARATOR: char = ':';

/// An emoji kind attached to a message.
///
/// Identity is the `(name, id)` pair. Platform-wide emoji have no id; custom
/// guild emoji carry the guild-scoped id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Emoji {
    pub id: Option<String>,
    pub name: String,
}

impl Emoji {
    pub fn generic(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    pub fn custom(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
        }
    }

    /// Flat string form used in storage and in reaction endpoints:
    /// `name:id` for custom emoji, `name` for generic ones.
    ///
    /// A name containing the separator does not survive [`Emoji::from_ref`].
    pub fn to_ref(&self) -> String {
        match &self.id {
            Some(id) => format!("{}{}{}", self.name, EMOJI_REF_SEPARATOR, id),
            None => self.name.clone(),
        }
    }

    pub fn from_ref(emoji_ref: &str) -> Self {
        match emoji_ref.split_once(EMOJI_REF_SEPARATOR) {
            Some((name, id)) => Self::custom(name, id),
            None => Self::generic(emoji_ref),
        }
    }
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ref())
    }
}

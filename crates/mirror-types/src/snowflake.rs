use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform identifier: a decimal string that orders by numeric magnitude.
///
/// Ids are kept as text so values wider than `u64` still compare correctly.
/// Leading zeros are stripped on construction, which keeps `Eq`, `Hash` and
/// `Ord` consistent with each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Snowflake(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnowflakeError {
    #[error("snowflake is empty")]
    Empty,
    #[error("snowflake {0:?} contains a non-digit character")]
    NotNumeric(String),
}

impl Snowflake {
    /// Smallest possible id; paging "after" it starts from the beginning.
    pub fn min() -> Self {
        Self("0".to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, SnowflakeError> {
        if raw.is_empty() {
            return Err(SnowflakeError::Empty);
        }
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SnowflakeError::NotNumeric(raw.to_string()));
        }
        let trimmed = raw.trim_start_matches('0');
        if trimmed.is_empty() {
            Ok(Self::min())
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for Snowflake {
    fn cmp(&self, other: &Self) -> Ordering {
        // Normalised digit strings: longer means larger, then lexicographic.
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Snowflake {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Snowflake {
    type Err = SnowflakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Snowflake {
    type Error = SnowflakeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Snowflake> for String {
    fn from(value: Snowflake) -> Self {
        value.0
    }
}

impl From<u64> for Snowflake {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

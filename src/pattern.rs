//! Subscription patterns.
//!
//! A pattern is either an exact event-type string, a trailing-wildcard
//! prefix (`"expense.*"` style), or the match-all `"*"`. There is no regex
//! support and no multi-segment wildcarding; a `*` anywhere but the end is
//! treated as a literal character.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A subscription pattern matched against event-type tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Pattern {
    /// Matches every event type.
    All,
    /// Matches event types starting with the stored prefix.
    Prefix(String),
    /// Matches one event type exactly.
    Exact(String),
}

impl Pattern {
    /// Parses a pattern string.
    ///
    /// `"*"` matches everything, a trailing `*` makes a prefix pattern, and
    /// anything else is an exact match.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyPattern` for a blank string.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValidationError::EmptyPattern);
        }

        if raw == "*" {
            return Ok(Self::All);
        }

        if let Some(prefix) = raw.strip_suffix('*') {
            // "foo*" matches "foo" itself as well as any extension of it.
            return Ok(Self::Prefix(prefix.to_string()));
        }

        Ok(Self::Exact(raw.to_string()))
    }

    /// An exact pattern for a known event-type tag.
    #[must_use]
    pub fn exact(event_type: impl Into<String>) -> Self {
        Self::Exact(event_type.into())
    }

    /// Whether this pattern accepts the given event type.
    #[must_use]
    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            Self::All => true,
            Self::Prefix(prefix) => event_type.starts_with(prefix.as_str()),
            Self::Exact(exact) => event_type == exact,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "*"),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
            Self::Exact(exact) => write!(f, "{exact}"),
        }
    }
}

//! Domain primitives shared across the sync engine.
//!
//! Newtype wrappers prevent mixing identifiers that happen to share a
//! representation (an AniList media id and a Plex rating key are both
//! integers, but never interchangeable).

pub mod events;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a configured sync profile by its unique name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProfileName(String);

impl ProfileName {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProfileName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for ProfileName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// An AniList media id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AniListId(i32);

impl AniListId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for AniListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for AniListId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

impl From<AniListId> for i32 {
    fn from(id: AniListId) -> Self {
        id.0
    }
}

/// A Plex `ratingKey`, unique within a single Plex Media Server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RatingKey(i64);

impl RatingKey {
    #[must_use]
    pub const fn new(key: i64) -> Self {
        Self(key)
    }

    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RatingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RatingKey {
    fn from(key: i64) -> Self {
        Self::new(key)
    }
}

impl From<RatingKey> for i64 {
    fn from(key: RatingKey) -> Self {
        key.0
    }
}

/// Controls how aggressively the Reconciliation Engine is allowed to write
/// to AniList.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Only ever raises progress/status forward, never deletes or downgrades.
    #[default]
    Progressive,
    /// May downgrade status and delete entries to exactly match Plex state.
    Destructive,
}

impl SyncMode {
    #[must_use]
    pub const fn is_destructive(self) -> bool {
        matches!(self, Self::Destructive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_primitives() {
        let id = AniListId::from(101);
        assert_eq!(i32::from(id), 101);
        let key = RatingKey::from(55555_i64);
        assert_eq!(i64::from(key), 55555);
    }

    #[test]
    fn profile_name_display() {
        let p = ProfileName::new("default");
        assert_eq!(p.to_string(), "default");
        assert_eq!(p.as_str(), "default");
    }

    #[test]
    fn sync_mode_defaults_progressive() {
        assert!(!SyncMode::default().is_destructive());
        assert!(SyncMode::Destructive.is_destructive());
    }
}

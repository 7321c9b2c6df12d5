use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Mirrors AniList's `MediaListStatus` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AniListStatus {
    Current,
    Planning,
    Completed,
    Dropped,
    Paused,
    Repeating,
}

impl AniListStatus {
    /// GraphQL enum spelling used on the wire.
    #[must_use]
    pub const fn as_graphql(self) -> &'static str {
        match self {
            Self::Current => "CURRENT",
            Self::Planning => "PLANNING",
            Self::Completed => "COMPLETED",
            Self::Dropped => "DROPPED",
            Self::Paused => "PAUSED",
            Self::Repeating => "REPEATING",
        }
    }

    #[must_use]
    pub fn from_graphql(s: &str) -> Option<Self> {
        match s {
            "CURRENT" => Some(Self::Current),
            "PLANNING" => Some(Self::Planning),
            "COMPLETED" => Some(Self::Completed),
            "DROPPED" => Some(Self::Dropped),
            "PAUSED" => Some(Self::Paused),
            "REPEATING" => Some(Self::Repeating),
            _ => None,
        }
    }

    /// Whether this status is "sticky" under progressive sync — COMPLETED
    /// must not be downgraded unless destructive sync is enabled.
    #[must_use]
    pub const fn is_sticky(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// A single AniList list entry for one media id, with null-field semantics
/// preserved distinctly from zero (hence `Option<i32>` rather than `i32`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AniListListEntry {
    pub media_id: i32,
    pub status: Option<AniListStatus>,
    pub progress: i32,
    pub repeat: i32,
    pub score: Option<f32>,
    pub notes: Option<String>,
    pub started_at: Option<NaiveDate>,
    pub completed_at: Option<NaiveDate>,
}

impl AniListListEntry {
    /// A blank entry for a media id with no prior AniList state.
    #[must_use]
    pub const fn absent(media_id: i32) -> Self {
        Self {
            media_id,
            status: None,
            progress: 0,
            repeat: 0,
            score: None,
            notes: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// The set of field names this type exposes, used for pin/exclusion
    /// checks. Kept as a single source of truth so pin validation and patch
    /// construction can never disagree on what a "field" is.
    pub const FIELD_NAMES: [&'static str; 7] = [
        "status",
        "progress",
        "repeat",
        "score",
        "notes",
        "started_at",
        "completed_at",
    ];
}

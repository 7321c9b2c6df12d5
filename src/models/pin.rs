use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user-declared field on a specific AniList entry that the Reconciliation
/// Engine must never overwrite, e.g. a manually-set score. See
/// `AniListListEntry::FIELD_NAMES` for the set of pinnable field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinRecord {
    pub profile: String,
    pub anilist_id: i32,
    pub field: String,
    pub pinned_at: DateTime<Utc>,
}

impl PinRecord {
    #[must_use]
    pub fn new(profile: impl Into<String>, anilist_id: i32, field: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            anilist_id,
            field: field.into(),
            pinned_at: Utc::now(),
        }
    }
}

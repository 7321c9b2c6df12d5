use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of library item a `PlexItem` represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlexItemType {
    Movie,
    Show,
    Season,
    Episode,
}

/// One external identifier attached to a Plex item, e.g. `tvdb://81797`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlexGuid {
    pub provider: String,
    pub id: String,
}

impl PlexGuid {
    /// Parses a Plex `Guid` value of the form `provider://id`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (provider, id) = raw.split_once("://")?;
        if provider.is_empty() || id.is_empty() {
            return None;
        }
        Some(Self {
            provider: provider.to_string(),
            id: id.to_string(),
        })
    }
}

/// A resolved unit of work handed from the Plex client to the Mapping
/// Resolver: a movie, season, or episode (shows are descended to season
/// granularity before resolution, per the spec).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlexItem {
    pub section_key: i64,
    pub rating_key: i64,
    pub parent_rating_key: Option<i64>,
    pub guid: String,
    pub item_type: PlexItemType,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub user_rating: Option<f32>,
    pub view_count: u32,
    pub view_offset_ms: u64,
    pub duration_ms: u64,
    pub title: String,
    pub year: Option<i32>,
    pub guids: Vec<PlexGuid>,
    /// 1-based season index, present only for `Season`/`Episode` items.
    pub season_index: Option<i32>,
    /// 1-based episode index within the season, present only for `Episode`.
    pub episode_index: Option<i32>,
    /// Whether the item currently appears in the viewer's watchlist.
    pub in_watchlist: bool,
    /// Whether the item currently appears in "continue watching".
    pub in_continue_watching: bool,
    /// Plex review/comment text, if any.
    pub review_text: Option<String>,
}

impl PlexItem {
    /// True when the viewer has watched this item at least once.
    #[must_use]
    pub fn is_viewed(&self) -> bool {
        self.view_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_guid() {
        let g = PlexGuid::parse("tvdb://81797").unwrap();
        assert_eq!(g.provider, "tvdb");
        assert_eq!(g.id, "81797");
    }

    #[test]
    fn rejects_malformed_guid() {
        assert!(PlexGuid::parse("not-a-guid").is_none());
        assert!(PlexGuid::parse("tvdb://").is_none());
    }
}

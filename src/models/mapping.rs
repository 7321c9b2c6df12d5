use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A finite, possibly-discontiguous, ordered set of 1-based episode numbers,
/// parsed from an episode range expression such as `e1-e12`, `e0`, `e1-`,
/// `-e12`, or `e1-e12|e14`. See `crate::resolver::range` for the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EpisodeRange {
    episodes: Vec<u32>,
}

impl EpisodeRange {
    #[must_use]
    pub fn from_sorted_unique(mut episodes: Vec<u32>) -> Self {
        episodes.sort_unstable();
        episodes.dedup();
        Self { episodes }
    }

    #[must_use]
    pub fn specials() -> Self {
        Self { episodes: vec![0] }
    }

    #[must_use]
    pub fn contains(&self, episode: u32) -> bool {
        self.episodes.binary_search(&episode).is_ok()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    #[must_use]
    pub fn episodes(&self) -> &[u32] {
        &self.episodes
    }

    /// Intersects this range with a set of episode numbers viewed on Plex,
    /// returning the episodes that are both mapped and viewed.
    #[must_use]
    pub fn intersect_viewed<'a>(&'a self, viewed: &'a [u32]) -> Vec<u32> {
        viewed
            .iter()
            .copied()
            .filter(|e| self.contains(*e))
            .collect()
    }

    /// Length of the common prefix shared with `other`, used by the
    /// resolver's tie-breaking rule for overlapping season ranges.
    #[must_use]
    pub fn prefix_overlap_len(&self, other: &Self) -> usize {
        self.episodes
            .iter()
            .zip(other.episodes.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }
}

/// A single `season_key → episode_range` entry for one provider (TVDB or
/// TMDb), keyed by season number (0 = specials).
pub type SeasonRangeTable = BTreeMap<i32, RangeEntry>;

/// One resolved AniList target for a season range, carrying the source the
/// entry was merged from (used for the "earliest include wins" tie-break).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeEntry {
    pub anilist_id: i32,
    pub range_expr: String,
    pub source_order: usize,
}

/// Authoritative or custom record linking an AniList id to external
/// identifiers and episode-range tables. See spec.md §3 for invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Mapping {
    pub anilist_id: i32,
    /// Title used for override-only title+year matching and indexed into
    /// the mappings store's full-text search table.
    pub title: Option<String>,
    pub year: Option<i32>,
    pub anidb_id: Option<i32>,
    pub tvdb_id: Option<i32>,
    pub tmdb_movie_id: Vec<i32>,
    pub tmdb_show_id: Vec<i32>,
    pub imdb_id: Vec<String>,
    pub mal_id: Vec<i32>,
    pub tvdb_season_ranges: SeasonRangeTable,
    pub tmdb_season_ranges: SeasonRangeTable,
    pub sources: Vec<String>,
    pub custom: bool,
    /// URLs or local paths to other mapping documents this entry extends.
    /// Resolved depth-first at database-sync time; never touched by a
    /// profile sync run.
    #[serde(rename = "$includes", default)]
    pub includes: Vec<String>,
}

impl Mapping {
    #[must_use]
    pub fn new(anilist_id: i32) -> Self {
        Self {
            anilist_id,
            ..Default::default()
        }
    }

    /// Shallow-merges `overlay` onto `self` per spec semantics: a field
    /// present (non-default) in `overlay` replaces the base field; scalar
    /// `Option` fields explicitly set to a sentinel "null" are handled by
    /// the caller before this is invoked (see `resolver::mapping_store`).
    /// Vec fields are replaced wholesale rather than appended, matching the
    /// "later writer replaces the field" rule.
    pub fn merge_overlay(&mut self, overlay: Self) {
        if overlay.title.is_some() {
            self.title = overlay.title;
        }
        if overlay.year.is_some() {
            self.year = overlay.year;
        }
        if overlay.anidb_id.is_some() {
            self.anidb_id = overlay.anidb_id;
        }
        if overlay.tvdb_id.is_some() {
            self.tvdb_id = overlay.tvdb_id;
        }
        if !overlay.tmdb_movie_id.is_empty() {
            self.tmdb_movie_id = overlay.tmdb_movie_id;
        }
        if !overlay.tmdb_show_id.is_empty() {
            self.tmdb_show_id = overlay.tmdb_show_id;
        }
        if !overlay.imdb_id.is_empty() {
            self.imdb_id = overlay.imdb_id;
        }
        if !overlay.mal_id.is_empty() {
            self.mal_id = overlay.mal_id;
        }
        for (season, entry) in overlay.tvdb_season_ranges {
            self.tvdb_season_ranges.insert(season, entry);
        }
        for (season, entry) in overlay.tmdb_season_ranges {
            self.tmdb_season_ranges.insert(season, entry);
        }
        self.sources.extend(overlay.sources);
        self.custom = self.custom || overlay.custom;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn episode_range_contains_and_intersect() {
        let r = EpisodeRange::from_sorted_unique(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        assert!(r.contains(12));
        assert!(!r.contains(13));
        let viewed = vec![1, 2, 3, 13, 14];
        assert_eq!(r.intersect_viewed(&viewed), vec![1, 2, 3]);
    }

    #[test]
    fn specials_is_single_zero() {
        let r = EpisodeRange::specials();
        assert!(r.contains(0));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn prefix_overlap_counts_shared_leading_episodes() {
        let a = EpisodeRange::from_sorted_unique(vec![1, 2, 3, 4]);
        let b = EpisodeRange::from_sorted_unique(vec![1, 2, 3, 9]);
        assert_eq!(a.prefix_overlap_len(&b), 3);
    }

    #[test]
    fn merge_overlay_replaces_present_fields_only() {
        let mut base = Mapping::new(1);
        base.tvdb_id = Some(100);
        base.mal_id = vec![5];
        base.sources.push("base.json".into());

        let mut overlay = Mapping::new(1);
        overlay.mal_id = vec![6];
        overlay.sources.push("custom.json".into());
        overlay.custom = true;

        base.merge_overlay(overlay);
        assert_eq!(base.tvdb_id, Some(100));
        assert_eq!(base.mal_id, vec![6]);
        assert_eq!(base.sources, vec!["base.json", "custom.json"]);
        assert!(base.custom);
    }
}

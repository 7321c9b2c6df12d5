//! Mapping Resolver: turns a `PlexItem` into zero or more AniList targets.
//!
//! Resolution order (first non-empty wins): direct guid match, override-only
//! title+year match, fuzzy title search. See `resolve` for the algorithm.

pub mod fuzzy;
pub mod query;
pub mod range;

use anyhow::Result;
use tracing::debug;

use crate::clients::anilist::AnilistClient;
use crate::db::Store;
use crate::models::mapping::{EpisodeRange, Mapping, RangeEntry};
use crate::models::plex_item::{PlexGuid, PlexItem, PlexItemType};

/// One resolved (anilist_id, sub-range) pair covering part or all of a
/// `PlexItem`. `episode_range` is `None` for movies and for shows that map
/// straight across without a season-split.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub anilist_id: i32,
    pub episode_range: Option<EpisodeRange>,
    pub source: MatchSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    DirectGuid,
    Override,
    Fuzzy,
}

#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    Matched(Vec<ResolvedTarget>),
    NotFound { candidates: Vec<i32> },
}

/// Provider priority for shows, highest first.
const SHOW_PROVIDER_PRIORITY: &[&str] = &["tvdb", "tmdb", "imdb", "anidb", "mal"];
/// Provider priority for movies, highest first.
const MOVIE_PROVIDER_PRIORITY: &[&str] = &["tmdb", "imdb"];

pub struct MappingResolver {
    store: Store,
    anilist: AnilistClient,
    fuzzy_threshold: u8,
}

impl MappingResolver {
    #[must_use]
    pub const fn new(store: Store, anilist: AnilistClient, fuzzy_threshold: u8) -> Self {
        Self {
            store,
            anilist,
            fuzzy_threshold,
        }
    }

    pub async fn resolve(&self, item: &PlexItem) -> Result<ResolveOutcome> {
        if let Some(targets) = self.direct_guid_match(item).await? {
            return Ok(ResolveOutcome::Matched(targets));
        }

        if let Some(target) = self.override_match(item).await? {
            return Ok(ResolveOutcome::Matched(vec![target]));
        }

        match self.fuzzy_match(item).await? {
            Some(target) => Ok(ResolveOutcome::Matched(vec![target])),
            None => Ok(ResolveOutcome::NotFound {
                candidates: Vec::new(),
            }),
        }
    }

    async fn direct_guid_match(&self, item: &PlexItem) -> Result<Option<Vec<ResolvedTarget>>> {
        let mappings = self.store.list_mappings().await?;
        let priority = if item.item_type == PlexItemType::Movie {
            MOVIE_PROVIDER_PRIORITY
        } else {
            SHOW_PROVIDER_PRIORITY
        };

        for provider in priority {
            let Some(guid) = item.guids.iter().find(|g| g.provider == *provider) else {
                continue;
            };

            let matching: Vec<&Mapping> = mappings
                .iter()
                .filter(|m| mapping_matches_guid(m, guid))
                .collect();

            if matching.is_empty() {
                continue;
            }

            if matches!(item.item_type, PlexItemType::Movie) {
                return Ok(Some(vec![ResolvedTarget {
                    anilist_id: matching[0].anilist_id,
                    episode_range: None,
                    source: MatchSource::DirectGuid,
                }]));
            }

            if let Some(season) = item.season_index {
                let targets = season_targets(&matching, season);
                if !targets.is_empty() {
                    return Ok(Some(targets));
                }
            }

            return Ok(Some(vec![ResolvedTarget {
                anilist_id: matching[0].anilist_id,
                episode_range: None,
                source: MatchSource::DirectGuid,
            }]));
        }

        Ok(None)
    }

    async fn override_match(&self, item: &PlexItem) -> Result<Option<ResolvedTarget>> {
        let Some(title) = non_empty(&item.title) else {
            return Ok(None);
        };

        let candidates = self
            .store
            .find_mappings_by_title_year(title, item.year)
            .await?;

        let best = candidates.into_iter().find(|m| m.custom);
        Ok(best.map(|m| ResolvedTarget {
            anilist_id: m.anilist_id,
            episode_range: None,
            source: MatchSource::Override,
        }))
    }

    async fn fuzzy_match(&self, item: &PlexItem) -> Result<Option<ResolvedTarget>> {
        let Some(title) = non_empty(&item.title) else {
            return Ok(None);
        };

        let candidates = self.anilist.search_media(title, item.year).await?;
        let Some(best) = fuzzy::best_match(title, item.year, &candidates, self.fuzzy_threshold)
        else {
            debug!(title, "fuzzy search found no candidate above threshold");
            return Ok(None);
        };

        Ok(Some(ResolvedTarget {
            anilist_id: best.id,
            episode_range: None,
            source: MatchSource::Fuzzy,
        }))
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn mapping_matches_guid(mapping: &Mapping, guid: &PlexGuid) -> bool {
    let Ok(id) = guid.id.parse::<i32>() else {
        return guid.provider == "imdb" && mapping.imdb_id.iter().any(|v| v == &guid.id);
    };

    match guid.provider.as_str() {
        "tvdb" => mapping.tvdb_id == Some(id),
        "tmdb" => mapping.tmdb_movie_id.contains(&id) || mapping.tmdb_show_id.contains(&id),
        "anidb" => mapping.anidb_id == Some(id),
        "mal" => mapping.mal_id.contains(&id),
        "imdb" => mapping.imdb_id.iter().any(|v| v == &guid.id),
        _ => false,
    }
}

/// Resolves all mappings that claim a sub-range of `season`, applying the
/// overlap tie-break: longest shared prefix wins, then earliest
/// `source_order`.
fn season_targets(mappings: &[&Mapping], season: i32) -> Vec<ResolvedTarget> {
    let mut entries: Vec<&RangeEntry> = mappings
        .iter()
        .filter_map(|m| {
            m.tvdb_season_ranges
                .get(&season)
                .or_else(|| m.tmdb_season_ranges.get(&season))
        })
        .collect();

    entries.sort_by_key(|e| e.source_order);

    let mut ranges: Vec<(RangeEntry, EpisodeRange)> = entries
        .into_iter()
        .filter_map(|e| range::parse_range_expr(&e.range_expr).map(|r| (e.clone(), r)))
        .collect();

    // Overlap resolution: when two ranges share episodes, keep the one with
    // the longer matching prefix (ties broken by earlier source_order, which
    // the input is already sorted by).
    let mut resolved: Vec<(RangeEntry, EpisodeRange)> = Vec::new();
    'outer: for (entry, range) in ranges.drain(..) {
        for (kept_entry, kept_range) in &resolved {
            if kept_range.prefix_overlap_len(&range) > 0 {
                let _ = kept_entry;
                continue 'outer;
            }
        }
        resolved.push((entry, range));
    }

    resolved
        .into_iter()
        .map(|(entry, range)| ResolvedTarget {
            anilist_id: entry.anilist_id,
            episode_range: Some(range),
            source: MatchSource::DirectGuid,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::mapping::RangeEntry;

    fn guid(provider: &str, id: &str) -> PlexGuid {
        PlexGuid {
            provider: provider.to_string(),
            id: id.to_string(),
        }
    }

    #[test]
    fn mapping_matches_guid_by_tvdb() {
        let mut m = Mapping::new(1);
        m.tvdb_id = Some(81797);
        assert!(mapping_matches_guid(&m, &guid("tvdb", "81797")));
        assert!(!mapping_matches_guid(&m, &guid("tvdb", "1")));
    }

    #[test]
    fn mapping_matches_guid_by_imdb_string_id() {
        let mut m = Mapping::new(1);
        m.imdb_id = vec!["tt2560140".to_string()];
        assert!(mapping_matches_guid(&m, &guid("imdb", "tt2560140")));
    }

    #[test]
    fn season_targets_resolves_cour_split() {
        let mut a = Mapping::new(100);
        a.tvdb_season_ranges.insert(
            1,
            RangeEntry {
                anilist_id: 100,
                range_expr: "e1-e12".to_string(),
                source_order: 0,
            },
        );
        let mut b = Mapping::new(200);
        b.tvdb_season_ranges.insert(
            1,
            RangeEntry {
                anilist_id: 200,
                range_expr: "e13-e24".to_string(),
                source_order: 1,
            },
        );

        let targets = season_targets(&[&a, &b], 1);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].anilist_id, 100);
        assert_eq!(targets[1].anilist_id, 200);
    }
}

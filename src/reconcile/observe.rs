//! Pure derivation of "what Plex says" into an `AniListListEntry` shape,
//! with no I/O — unit-testable in isolation from the Reconciliation Engine.

use chrono::NaiveDate;

use crate::models::anilist_entry::{AniListListEntry, AniListStatus};
use crate::models::mapping::EpisodeRange;
use crate::models::plex_item::PlexItem;

/// Everything Plex observed about one target before AniList policy is
/// applied. `media_id` is filled in by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedState {
    pub progress: i32,
    pub status: Option<AniListStatus>,
    pub score: Option<f32>,
    pub notes: Option<String>,
    pub started_at: Option<NaiveDate>,
    pub completed_at: Option<NaiveDate>,
    pub repeat: i32,
    /// True only when no Plex item exists for this target at all (used by
    /// destructive-mode deletion).
    pub absent_from_library: bool,
}

/// Derives observed state from the Plex item(s) covering one resolved
/// target. `items` is the episode children within `range` for a show target,
/// or a single-element slice for a movie. `media_episode_count` clamps
/// progress when AniList knows the media's total episode count.
#[must_use]
pub fn derive_observed_state(
    items: &[PlexItem],
    range: Option<&EpisodeRange>,
    media_episode_count: Option<i32>,
) -> ObservedState {
    if items.is_empty() {
        return ObservedState {
            progress: 0,
            status: None,
            score: None,
            notes: None,
            started_at: None,
            completed_at: None,
            repeat: 0,
            absent_from_library: true,
        };
    }

    let is_movie = range.is_none() && items.len() == 1 && items[0].season_index.is_none();

    let (progress, episodes_in_range) = if is_movie {
        let viewed = u32::from(items[0].is_viewed());
        (i32::from(viewed > 0), 1)
    } else {
        let viewed_episodes: Vec<u32> = items
            .iter()
            .filter(|i| i.is_viewed())
            .filter_map(|i| i.episode_index)
            .map(|e| u32::try_from(e).unwrap_or(0))
            .collect();

        let count = range.map_or_else(
            || viewed_episodes.len(),
            |r| r.intersect_viewed(&viewed_episodes).len(),
        );
        (i32::try_from(count).unwrap_or(0), items.len())
    };

    let progress = media_episode_count.map_or(progress, |total| progress.min(total));

    let view_count = items.iter().map(|i| i.view_count).max().unwrap_or(0);
    let view_count_i32 = i32::try_from(view_count).unwrap_or(i32::MAX);
    let repeat = if is_movie {
        (view_count_i32 - 1).max(0)
    } else {
        let eps = i32::try_from(episodes_in_range).unwrap_or(i32::MAX);
        (view_count_i32 - eps).max(0)
    };

    let in_watchlist = items.iter().any(|i| i.in_watchlist);
    let in_continue_watching = items.iter().any(|i| i.in_continue_watching);

    let status = compute_status(
        progress,
        media_episode_count,
        in_watchlist,
        in_continue_watching,
        repeat,
    );

    let score = items
        .iter()
        .filter_map(|i| i.user_rating)
        .next()
        .map(|r| (r * 10.0).clamp(0.0, 100.0));

    let notes = items
        .iter()
        .filter_map(|i| i.review_text.clone())
        .find(|t| !t.trim().is_empty());

    let started_at = items
        .iter()
        .filter(|i| i.is_viewed())
        .filter_map(|i| i.last_viewed_at)
        .min()
        .map(|dt| dt.date_naive());
    let completed_at = items
        .iter()
        .filter(|i| i.is_viewed())
        .filter_map(|i| i.last_viewed_at)
        .max()
        .map(|dt| dt.date_naive());

    ObservedState {
        progress,
        status,
        score,
        notes,
        started_at,
        completed_at,
        repeat,
        absent_from_library: false,
    }
}

fn compute_status(
    progress: i32,
    episode_count: Option<i32>,
    in_watchlist: bool,
    in_continue_watching: bool,
    repeat: i32,
) -> Option<AniListStatus> {
    if let Some(total) = episode_count
        && total > 0
        && progress >= total
    {
        return Some(if repeat > 0 {
            AniListStatus::Repeating
        } else {
            AniListStatus::Completed
        });
    }

    if progress > 0 {
        return Some(AniListStatus::Current);
    }

    if in_watchlist {
        return Some(AniListStatus::Planning);
    }

    if in_continue_watching {
        return Some(AniListStatus::Current);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn episode(index: i32, viewed: bool, view_count: u32) -> PlexItem {
        PlexItem {
            section_key: 1,
            rating_key: i64::from(index),
            parent_rating_key: Some(1),
            guid: format!("plex://episode/{index}"),
            item_type: crate::models::plex_item::PlexItemType::Episode,
            added_at: Utc::now(),
            updated_at: Utc::now(),
            last_viewed_at: viewed.then(Utc::now),
            user_rating: None,
            view_count,
            view_offset_ms: 0,
            duration_ms: 1_200_000,
            title: format!("Episode {index}"),
            year: None,
            guids: vec![],
            season_index: Some(1),
            episode_index: Some(index),
            in_watchlist: false,
            in_continue_watching: false,
            review_text: None,
        }
    }

    #[test]
    fn movie_progress_is_binary() {
        let mut movie = episode(1, true, 2);
        movie.season_index = None;
        movie.episode_index = None;
        let state = derive_observed_state(&[movie], None, None);
        assert_eq!(state.progress, 1);
        assert_eq!(state.repeat, 1);
        assert_eq!(state.status, Some(AniListStatus::Completed));
    }

    #[test]
    fn show_progress_counts_viewed_within_range() {
        let range = EpisodeRange::from_sorted_unique(vec![1, 2, 3]);
        let items = vec![episode(1, true, 1), episode(2, true, 1), episode(3, false, 0)];
        let state = derive_observed_state(&items, Some(&range), Some(3));
        assert_eq!(state.progress, 2);
        assert_eq!(state.status, Some(AniListStatus::Current));
    }

    #[test]
    fn full_completion_yields_completed() {
        let range = EpisodeRange::from_sorted_unique(vec![1, 2]);
        let items = vec![episode(1, true, 1), episode(2, true, 1)];
        let state = derive_observed_state(&items, Some(&range), Some(2));
        assert_eq!(state.progress, 2);
        assert_eq!(state.status, Some(AniListStatus::Completed));
    }

    #[test]
    fn no_items_means_absent() {
        let state = derive_observed_state(&[], None, None);
        assert!(state.absent_from_library);
    }
}

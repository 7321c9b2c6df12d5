//! Pure policy application: observed state + current AniList state + sync
//! mode + exclusions/pins → the target entry the engine wants to write.

use std::collections::HashSet;

use crate::domain::SyncMode;
use crate::models::anilist_entry::{AniListListEntry, AniListStatus};

use super::observe::ObservedState;

/// Applies progressive or destructive policy to produce the entry AniList
/// should end up with, with excluded/pinned fields already removed.
/// `current` is `None` when no AniList entry has ever existed for this
/// media id. Returns `None` when no entry should exist: either the item left
/// the Plex library under destructive sync, or no entry ever existed and
/// Plex doesn't warrant creating one.
///
/// A brand-new PLANNING entry (watchlisted, never watched) is only created
/// when `destructive_sync` is enabled or an AniList entry already exists —
/// progressive sync alone never originates a watchlist-only entry.
#[must_use]
pub fn apply_policy(
    observed: &ObservedState,
    current: Option<&AniListListEntry>,
    media_id: i32,
    mode: SyncMode,
    excluded_fields: &HashSet<&str>,
    pinned_fields: &HashSet<&str>,
) -> Option<AniListListEntry> {
    if observed.absent_from_library {
        return if mode.is_destructive() {
            None
        } else {
            current.cloned()
        };
    }

    if current.is_none() {
        if observed.status.is_none() {
            return None;
        }
        if observed.status == Some(AniListStatus::Planning) && !mode.is_destructive() {
            return None;
        }
    }

    let baseline = current
        .cloned()
        .unwrap_or_else(|| AniListListEntry::absent(media_id));

    let mut target = match mode {
        SyncMode::Progressive => apply_progressive(observed, &baseline),
        SyncMode::Destructive => apply_destructive(observed, &baseline),
    };

    let removed: HashSet<&str> = excluded_fields.union(pinned_fields).copied().collect();
    restore_excluded_fields(&mut target, &baseline, &removed);

    Some(target)
}

fn apply_progressive(observed: &ObservedState, current: &AniListListEntry) -> AniListListEntry {
    let mut target = current.clone();

    target.progress = observed.progress.max(current.progress);
    target.repeat = observed.repeat.max(current.repeat);

    if !current.status.is_some_and(AniListStatus::is_sticky) {
        target.status = observed.status.or(current.status);
    }

    target.completed_at = later(current.completed_at, observed.completed_at);
    target.started_at = earlier(current.started_at, observed.started_at);

    if current.score.is_none() {
        target.score = observed.score;
    }

    if current.notes.is_none() {
        target.notes = observed.notes.clone();
    }

    target
}

fn apply_destructive(observed: &ObservedState, current: &AniListListEntry) -> AniListListEntry {
    AniListListEntry {
        media_id: current.media_id,
        status: non_zero_or(observed.status, current.status),
        progress: if observed.progress == 0 {
            current.progress
        } else {
            observed.progress
        },
        repeat: if observed.repeat == 0 {
            current.repeat
        } else {
            observed.repeat
        },
        score: observed.score.or(current.score),
        notes: observed.notes.clone().or_else(|| current.notes.clone()),
        started_at: observed.started_at.or(current.started_at),
        completed_at: observed.completed_at.or(current.completed_at),
    }
}

fn non_zero_or<T>(observed: Option<T>, current: Option<T>) -> Option<T> {
    observed.or(current)
}

fn later<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

fn earlier<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

fn restore_excluded_fields(
    target: &mut AniListListEntry,
    current: &AniListListEntry,
    removed: &HashSet<&str>,
) {
    if removed.contains("status") {
        target.status = current.status;
    }
    if removed.contains("progress") {
        target.progress = current.progress;
    }
    if removed.contains("repeat") {
        target.repeat = current.repeat;
    }
    if removed.contains("score") {
        target.score = current.score;
    }
    if removed.contains("notes") {
        target.notes.clone_from(&current.notes);
    }
    if removed.contains("started_at") {
        target.started_at = current.started_at;
    }
    if removed.contains("completed_at") {
        target.completed_at = current.completed_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed(progress: i32, status: Option<AniListStatus>) -> ObservedState {
        ObservedState {
            progress,
            status,
            score: None,
            notes: None,
            started_at: None,
            completed_at: None,
            repeat: 0,
            absent_from_library: false,
        }
    }

    #[test]
    fn progressive_never_downgrades_progress() {
        let mut current = AniListListEntry::absent(1);
        current.progress = 10;
        let obs = observed(5, Some(AniListStatus::Current));
        let target = apply_policy(
            &obs,
            Some(&current),
            1,
            SyncMode::Progressive,
            &HashSet::new(),
            &HashSet::new(),
        )
        .unwrap();
        assert_eq!(target.progress, 10);
    }

    #[test]
    fn progressive_keeps_completed_sticky() {
        let mut current = AniListListEntry::absent(1);
        current.status = Some(AniListStatus::Completed);
        current.progress = 12;
        let obs = observed(3, Some(AniListStatus::Current));
        let target = apply_policy(
            &obs,
            Some(&current),
            1,
            SyncMode::Progressive,
            &HashSet::new(),
            &HashSet::new(),
        )
        .unwrap();
        assert_eq!(target.status, Some(AniListStatus::Completed));
    }

    #[test]
    fn destructive_overwrites_but_not_with_zero() {
        let mut current = AniListListEntry::absent(1);
        current.progress = 10;
        let obs = observed(0, None);
        let target = apply_policy(
            &obs,
            Some(&current),
            1,
            SyncMode::Destructive,
            &HashSet::new(),
            &HashSet::new(),
        )
        .unwrap();
        assert_eq!(target.progress, 10);
    }

    #[test]
    fn absent_from_library_deletes_only_when_destructive() {
        let current = AniListListEntry::absent(1);
        let obs = ObservedState {
            absent_from_library: true,
            ..observed(0, None)
        };
        assert!(
            apply_policy(&obs, Some(&current), 1, SyncMode::Progressive, &HashSet::new(), &HashSet::new())
                .is_some()
        );
        assert!(
            apply_policy(&obs, Some(&current), 1, SyncMode::Destructive, &HashSet::new(), &HashSet::new())
                .is_none()
        );
    }

    #[test]
    fn no_current_entry_and_no_observed_status_yields_no_plan() {
        let obs = observed(0, None);
        assert!(apply_policy(&obs, None, 1, SyncMode::Progressive, &HashSet::new(), &HashSet::new()).is_none());
    }

    #[test]
    fn progressive_never_originates_a_watchlist_only_entry() {
        let obs = observed(0, Some(AniListStatus::Planning));
        assert!(apply_policy(&obs, None, 7, SyncMode::Progressive, &HashSet::new(), &HashSet::new()).is_none());
    }

    #[test]
    fn destructive_may_originate_a_watchlist_only_entry() {
        let obs = observed(0, Some(AniListStatus::Planning));
        let target =
            apply_policy(&obs, None, 7, SyncMode::Destructive, &HashSet::new(), &HashSet::new()).unwrap();
        assert_eq!(target.media_id, 7);
        assert_eq!(target.status, Some(AniListStatus::Planning));
    }

    #[test]
    fn excluded_fields_are_restored_to_current() {
        let mut current = AniListListEntry::absent(1);
        current.progress = 2;
        let obs = observed(8, None);
        let mut excluded = HashSet::new();
        excluded.insert("progress");
        let target =
            apply_policy(&obs, Some(&current), 1, SyncMode::Progressive, &excluded, &HashSet::new()).unwrap();
        assert_eq!(target.progress, 2);
    }
}

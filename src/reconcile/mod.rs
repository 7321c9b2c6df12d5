//! Reconciliation Engine: turns resolved targets into AniList writes.
//!
//! Follows the teacher's domain-service split — a trait for the operation
//! the rest of the engine depends on, with one concrete implementation
//! wired to the real `Store`/`AnilistClient`, and the decision logic itself
//! factored into pure, individually-tested functions (`observe`, `policy`,
//! `plan`).

pub mod observe;
pub mod plan;
pub mod policy;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::clients::anilist::AnilistClient;
use crate::constants::DEFAULT_BATCH_SIZE;
use crate::db::Store;
use crate::domain::SyncMode;
use crate::models::anilist_entry::AniListListEntry;
use crate::models::history::SyncOutcome;
use crate::models::plan::{PlanKind, PlanOp};
use crate::models::plex_item::PlexItem;

use observe::derive_observed_state;
use plan::diff_plan;
use policy::apply_policy;

/// What the Reconciliation Engine needs from a profile's configuration to
/// decide how aggressively to write.
#[derive(Debug, Clone)]
pub struct ReconcilePolicy {
    pub profile: String,
    pub sync_mode: SyncMode,
    pub dry_run: bool,
    pub excluded_fields: Vec<String>,
    /// Coalesce multiple `Upsert` writes into one aliased GraphQL mutation,
    /// up to `DEFAULT_BATCH_SIZE` entries per document.
    pub batch_requests: bool,
}

#[async_trait]
pub trait ReconcileEngine {
    /// Derives the observed state, applies policy, and diffs against the
    /// current AniList entry, without executing or recording anything.
    async fn plan_target(
        &self,
        policy: &ReconcilePolicy,
        media_id: i32,
        items: &[PlexItem],
        range: Option<&crate::models::mapping::EpisodeRange>,
        media_episode_count: Option<i32>,
    ) -> Result<PlanOp>;

    /// Executes a single already-planned op (unless `dry_run`) and records a
    /// `HistoryEvent`.
    async fn apply_target(
        &self,
        policy: &ReconcilePolicy,
        plex_rating_key: Option<i64>,
        op: PlanOp,
    ) -> Result<PlanOp>;

    /// Applies a batch of already-planned ops, coalescing `Upsert`s into as
    /// few AniList requests as `policy.batch_requests` allows. Deletes and
    /// no-ops are always applied individually. Falls back to per-target
    /// application for any `Upsert` the batch write didn't confirm.
    async fn apply_batch(
        &self,
        policy: &ReconcilePolicy,
        ops: Vec<(Option<i64>, PlanOp)>,
    ) -> Result<Vec<PlanOp>>;

    /// Convenience wrapper for callers that don't need batching: plans and
    /// immediately applies one target.
    async fn reconcile_target(
        &self,
        policy: &ReconcilePolicy,
        media_id: i32,
        plex_rating_key: Option<i64>,
        items: &[PlexItem],
        range: Option<&crate::models::mapping::EpisodeRange>,
        media_episode_count: Option<i32>,
    ) -> Result<PlanOp>;
}

pub struct StoreReconcileEngine {
    store: Store,
    anilist: AnilistClient,
}

impl StoreReconcileEngine {
    #[must_use]
    pub const fn new(store: Store, anilist: AnilistClient) -> Self {
        Self { store, anilist }
    }
}

#[async_trait]
impl ReconcileEngine for StoreReconcileEngine {
    async fn plan_target(
        &self,
        policy: &ReconcilePolicy,
        media_id: i32,
        items: &[PlexItem],
        range: Option<&crate::models::mapping::EpisodeRange>,
        media_episode_count: Option<i32>,
    ) -> Result<PlanOp> {
        let observed = derive_observed_state(items, range, media_episode_count);

        let current = self.anilist.cached_entry(media_id).await;
        let pinned = self.store.pinned_fields(&policy.profile, media_id).await?;
        let pinned_set: HashSet<&str> = pinned.iter().map(String::as_str).collect();
        let excluded_set: HashSet<&str> = policy.excluded_fields.iter().map(String::as_str).collect();

        let target = apply_policy(
            &observed,
            current.as_ref(),
            media_id,
            policy.sync_mode,
            &excluded_set,
            &pinned_set,
        );

        Ok(diff_plan(media_id, current.as_ref(), target.as_ref()))
    }

    async fn apply_target(
        &self,
        policy: &ReconcilePolicy,
        plex_rating_key: Option<i64>,
        op: PlanOp,
    ) -> Result<PlanOp> {
        if op.is_no_op() {
            return Ok(op);
        }

        let outcome = if policy.dry_run {
            SyncOutcome::Skipped
        } else {
            match execute(&self.anilist, &op).await {
                Ok(()) => SyncOutcome::Applied,
                Err(err) => {
                    warn!(?err, media_id = op.anilist_id, "failed to apply plan op");
                    self.record(
                        policy,
                        op.anilist_id,
                        plex_rating_key,
                        &op,
                        SyncOutcome::Failed,
                        Some(&err.to_string()),
                    )
                    .await?;
                    return Ok(op);
                }
            }
        };

        self.record(policy, op.anilist_id, plex_rating_key, &op, outcome, None).await?;
        info!(media_id = op.anilist_id, ?op.kind, reason = %op.reason, "reconciled target");
        Ok(op)
    }

    async fn apply_batch(
        &self,
        policy: &ReconcilePolicy,
        ops: Vec<(Option<i64>, PlanOp)>,
    ) -> Result<Vec<PlanOp>> {
        let mut results = Vec::with_capacity(ops.len());
        let mut upserts: Vec<(Option<i64>, PlanOp)> = Vec::new();

        for (rating_key, op) in ops {
            match op.kind {
                PlanKind::Upsert if !op.is_no_op() => upserts.push((rating_key, op)),
                _ => results.push(self.apply_target(policy, rating_key, op).await?),
            }
        }

        if upserts.is_empty() {
            return Ok(results);
        }

        if policy.dry_run || !policy.batch_requests || upserts.len() == 1 {
            for (rating_key, op) in upserts {
                results.push(self.apply_target(policy, rating_key, op).await?);
            }
            return Ok(results);
        }

        for chunk in upserts.chunks(DEFAULT_BATCH_SIZE) {
            let entries: Vec<AniListListEntry> = chunk.iter().map(|(_, op)| op.after.clone()).collect();

            match self.anilist.save_entries_batch(&entries).await {
                Ok(saved) => {
                    let saved_ids: HashSet<i32> = saved.iter().map(|e| e.media_id).collect();
                    for (rating_key, op) in chunk {
                        if saved_ids.contains(&op.anilist_id) {
                            self.record(policy, op.anilist_id, *rating_key, op, SyncOutcome::Applied, None)
                                .await?;
                            info!(media_id = op.anilist_id, ?op.kind, reason = %op.reason, "reconciled target (batched)");
                        } else {
                            self.record(
                                policy,
                                op.anilist_id,
                                *rating_key,
                                op,
                                SyncOutcome::Failed,
                                Some("batched save did not confirm this entry"),
                            )
                            .await?;
                        }
                        results.push(op.clone());
                    }
                }
                Err(err) => {
                    warn!(?err, "batched save failed entirely, falling back to per-target apply");
                    for (rating_key, op) in chunk {
                        results.push(self.apply_target(policy, *rating_key, op.clone()).await?);
                    }
                }
            }
        }

        Ok(results)
    }

    async fn reconcile_target(
        &self,
        policy: &ReconcilePolicy,
        media_id: i32,
        plex_rating_key: Option<i64>,
        items: &[PlexItem],
        range: Option<&crate::models::mapping::EpisodeRange>,
        media_episode_count: Option<i32>,
    ) -> Result<PlanOp> {
        let op = self
            .plan_target(policy, media_id, items, range, media_episode_count)
            .await?;
        self.apply_target(policy, plex_rating_key, op).await
    }
}

impl StoreReconcileEngine {
    async fn record(
        &self,
        policy: &ReconcilePolicy,
        media_id: i32,
        plex_rating_key: Option<i64>,
        op: &PlanOp,
        outcome: SyncOutcome,
        error: Option<&str>,
    ) -> Result<()> {
        let before_json = serde_json::to_string(&op.before)?;
        let after_json = serde_json::to_string(&op.after)?;
        self.store
            .record_history(
                &policy.profile,
                media_id,
                plex_rating_key,
                op.kind,
                outcome,
                &before_json,
                &after_json,
                &op.changed_fields,
                &op.reason,
                error,
            )
            .await?;
        Ok(())
    }
}

async fn execute(anilist: &AnilistClient, op: &PlanOp) -> Result<()> {
    match op.kind {
        PlanKind::Upsert => {
            anilist.save_entry(&op.after).await?;
        }
        PlanKind::Delete => {
            anilist.delete_entry(op.anilist_id).await?;
        }
        PlanKind::NoOp => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_policy_carries_excluded_fields() {
        let policy = ReconcilePolicy {
            profile: "default".to_string(),
            sync_mode: SyncMode::Progressive,
            dry_run: true,
            excluded_fields: vec!["notes".to_string()],
            batch_requests: false,
        };
        assert_eq!(policy.excluded_fields, vec!["notes"]);
    }

    #[test]
    fn absent_entry_with_absent_library_state_never_panics() {
        let entry = AniListListEntry::absent(1);
        assert_eq!(entry.progress, 0);
    }
}

//! Scheduler / Profile Supervisor.
//!
//! One `ProfileSupervisor` task runs per configured profile, each owning its
//! own trigger queue and cooldown state rather than sharing a single global
//! interval — profiles must be able to fail and back off independently.
//! Modeled on the teacher's background-loop-plus-owning-struct split, using
//! `tokio::time::interval` for periodic/poll triggers and a bounded `mpsc`
//! channel, coalesced per trigger kind, for webhook/manual dispatch.

pub mod database_sync;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::clients::anilist::AnilistClient;
use crate::clients::plex::{PlexClient, ScanMode, Section};
use crate::config::ProfileConfig;
use crate::constants::cooldown::FAILURE_THRESHOLD;
use crate::constants::DISPATCH_QUEUE_DEPTH;
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::models::plan::PlanOp;
use crate::models::plex_item::{PlexItem, PlexItemType};
use crate::reconcile::{ReconcileEngine, ReconcilePolicy, StoreReconcileEngine};
use crate::resolver::{MappingResolver, ResolveOutcome};

/// Lifecycle stage a profile supervisor reports for status/observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileState {
    Idle,
    Preparing,
    Scanning,
    Reconciling,
    Writing,
    Failed,
}

/// What caused the current sync run to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Full,
    Partial,
    Poll,
    Webhook,
}

/// A coalescing dispatch queue: at most one pending trigger per kind is ever
/// queued, matching `DISPATCH_QUEUE_DEPTH`. A burst of identical triggers
/// (e.g. several webhook pings before the previous run drains) collapses to
/// one run.
#[derive(Clone)]
struct DispatchQueue {
    tx: mpsc::Sender<TriggerKind>,
    pending: Arc<RwLock<HashSet<TriggerKind>>>,
}

impl DispatchQueue {
    fn new() -> (Self, mpsc::Receiver<TriggerKind>) {
        let (tx, rx) = mpsc::channel(4.max(DISPATCH_QUEUE_DEPTH * 4));
        (
            Self {
                tx,
                pending: Arc::new(RwLock::new(HashSet::new())),
            },
            rx,
        )
    }

    async fn enqueue(&self, kind: TriggerKind) {
        {
            let mut pending = self.pending.write().await;
            if !pending.insert(kind) {
                return;
            }
        }
        if self.tx.send(kind).await.is_err() {
            warn!(?kind, "dispatch queue receiver gone, dropping trigger");
        }
    }

    async fn dequeue(&self, kind: TriggerKind) {
        self.pending.write().await.remove(&kind);
    }
}

/// Runs one profile's sync loop: periodic interval, poll interval, and
/// coalesced manual/webhook triggers, each funneling into the same
/// `run_once` call so they share cooldown state.
pub struct ProfileSupervisor {
    profile: String,
    config: ProfileConfig,
    store: Store,
    plex: PlexClient,
    anilist: AnilistClient,
    resolver: MappingResolver,
    engine: StoreReconcileEngine,
    state: Arc<RwLock<ProfileState>>,
    events: broadcast::Sender<NotificationEvent>,
    dispatch: DispatchQueue,
    dispatch_rx: Option<mpsc::Receiver<TriggerKind>>,
    consecutive_failures: u32,
}

impl ProfileSupervisor {
    #[must_use]
    pub fn new(
        profile: String,
        config: ProfileConfig,
        store: Store,
        events: broadcast::Sender<NotificationEvent>,
    ) -> Self {
        let plex = PlexClient::new(&config.plex_url, &config.plex_token);
        let anilist = AnilistClient::new(&config.anilist_token);
        let resolver = MappingResolver::new(
            store.clone(),
            anilist.clone(),
            config.fuzzy_search_threshold,
        );
        let engine = StoreReconcileEngine::new(store.clone(), anilist.clone());
        let (dispatch, dispatch_rx) = DispatchQueue::new();

        Self {
            profile,
            config,
            store,
            plex,
            anilist,
            resolver,
            engine,
            state: Arc::new(RwLock::new(ProfileState::Idle)),
            events,
            dispatch,
            dispatch_rx: Some(dispatch_rx),
            consecutive_failures: 0,
        }
    }

    #[must_use]
    pub fn state_handle(&self) -> Arc<RwLock<ProfileState>> {
        self.state.clone()
    }

    #[must_use]
    pub fn handle(&self) -> ProfileHandle {
        ProfileHandle {
            dispatch: self.dispatch.clone(),
        }
    }

    /// Drives this profile forever: periodic/poll intervals plus whatever
    /// lands on the dispatch queue, until `shutdown` resolves.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut dispatch_rx = self
            .dispatch_rx
            .take()
            .expect("run() is only called once per supervisor");

        let mut periodic = interval_or_never(self.config.sync_interval);
        let mut poll = interval_or_never(self.config.sync_interval.min(300).max(-1));

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(profile = %self.profile, "profile supervisor shutting down");
                    return;
                }
                _ = periodic.tick(), if self.config.full_scan_enabled() => {
                    self.run_guarded(TriggerKind::Full).await;
                }
                _ = poll.tick(), if self.config.uses_poll() => {
                    self.run_guarded(TriggerKind::Poll).await;
                }
                Some(kind) = dispatch_rx.recv() => {
                    self.dispatch.dequeue(kind).await;
                    self.run_guarded(kind).await;
                }
            }
        }
    }

    async fn run_guarded(&mut self, trigger: TriggerKind) {
        if self.consecutive_failures >= FAILURE_THRESHOLD {
            let backoff = cooldown_backoff(self.consecutive_failures);
            warn!(
                profile = %self.profile,
                failures = self.consecutive_failures,
                ?backoff,
                "profile in cooldown, delaying run"
            );
            tokio::time::sleep(backoff).await;
        }

        let started_at = std::time::Instant::now();

        match self.run_once(trigger).await {
            Ok((applied, skipped, failed)) => {
                self.consecutive_failures = 0;
                let _ = self.events.send(NotificationEvent::ProfileSyncFinished {
                    profile: self.profile.clone(),
                    applied,
                    skipped,
                    failed,
                    duration_ms: i64::try_from(started_at.elapsed().as_millis()).unwrap_or(i64::MAX),
                });
            }
            Err(err) => {
                self.consecutive_failures += 1;
                *self.state.write().await = ProfileState::Failed;
                error!(profile = %self.profile, ?err, "profile sync run failed");
                let _ = self
                    .store
                    .record_run(&self.profile, false, Some(&err.to_string()), 0, 0, 0)
                    .await;
                let _ = self.events.send(NotificationEvent::Error {
                    message: format!("{}: {err}", self.profile),
                });
                if self.consecutive_failures == FAILURE_THRESHOLD {
                    let _ = self.events.send(NotificationEvent::Info {
                        message: format!(
                            "profile '{}' entered cooldown after {} consecutive failures",
                            self.profile, self.consecutive_failures
                        ),
                    });
                }
            }
        }

        *self.state.write().await = ProfileState::Idle;
    }

    /// Runs one pass directly, bypassing the dispatch queue and cooldown —
    /// used by `plexanibridge sync` for a one-shot, synchronous run.
    pub async fn run_single(&self, trigger: TriggerKind) -> Result<(i32, i32, i32)> {
        self.run_once(trigger).await
    }

    /// One full preparing → scanning → reconciling → writing pass.
    async fn run_once(&self, trigger: TriggerKind) -> Result<(i32, i32, i32)> {
        let _ = self.events.send(NotificationEvent::ProfileSyncStarted {
            profile: self.profile.clone(),
        });

        *self.state.write().await = ProfileState::Preparing;
        let viewer = self.anilist.get_viewer().await?;
        let existing = self.anilist.get_list(viewer.id).await?;
        info!(profile = %self.profile, count = existing.len(), "loaded current AniList list");

        *self.state.write().await = ProfileState::Scanning;
        let sections = self.plex.list_sections().await?;
        let scan_mode = scan_mode_for(trigger, &self.store, &self.profile).await;

        let policy = ReconcilePolicy {
            profile: self.profile.clone(),
            sync_mode: self.config.sync_mode(),
            dry_run: self.config.dry_run,
            excluded_fields: self.config.excluded_sync_fields.clone(),
            batch_requests: self.config.batch_requests,
        };

        let (mut applied, mut skipped, mut failed) = (0, 0, 0);

        for section in sections
            .iter()
            .filter(|s| self.config.plex_sections.is_empty() || self.config.plex_sections.contains(&s.key))
        {
            let (a, s, f) = self.sync_section(section, scan_mode, &policy).await?;
            applied += a;
            skipped += s;
            failed += f;
        }

        *self.state.write().await = ProfileState::Writing;
        self.store
            .record_run(&self.profile, true, None, applied, skipped, failed)
            .await?;

        Ok((applied, skipped, failed))
    }

    async fn sync_section(
        &self,
        section: &Section,
        scan_mode: ScanMode,
        policy: &ReconcilePolicy,
    ) -> Result<(i32, i32, i32)> {
        let mut cursor = self.plex.iter_items(section, scan_mode);
        let (mut applied, mut skipped, mut failed) = (0, 0, 0);

        loop {
            let batch = cursor.next_batch().await?;
            if batch.is_empty() {
                break;
            }

            *self.state.write().await = ProfileState::Reconciling;
            let (processed, total) = cursor.progress();
            let _ = self.events.send(NotificationEvent::ProfileSyncProgress {
                profile: self.profile.clone(),
                current: usize::try_from(processed).unwrap_or(0),
                total: usize::try_from(total).unwrap_or(0),
            });

            let mut pending: Vec<(Option<i64>, PlanOp)> = Vec::new();

            for group in group_by_show_and_season(&batch) {
                let representative = group[0];
                match self.resolver.resolve(representative).await? {
                    ResolveOutcome::Matched(targets) => {
                        for target in targets {
                            let members: Vec<PlexItem> = match &target.episode_range {
                                Some(range) => group
                                    .iter()
                                    .filter(|item| {
                                        item.episode_index
                                            .and_then(|idx| u32::try_from(idx).ok())
                                            .is_some_and(|idx| range.contains(idx))
                                    })
                                    .map(|item| (*item).clone())
                                    .collect(),
                                None => group.iter().map(|item| (*item).clone()).collect(),
                            };
                            if members.is_empty() {
                                continue;
                            }
                            let rating_key = members[0].rating_key;
                            let op = self
                                .engine
                                .plan_target(
                                    policy,
                                    target.anilist_id,
                                    &members,
                                    target.episode_range.as_ref(),
                                    None,
                                )
                                .await?;
                            pending.push((Some(rating_key), op));
                        }
                    }
                    ResolveOutcome::NotFound { .. } => {
                        failed += 1;
                    }
                }
            }

            for op in self.engine.apply_batch(policy, pending).await? {
                if op.is_no_op() {
                    continue;
                }
                if policy.dry_run {
                    skipped += 1;
                    let _ = self.events.send(NotificationEvent::EntrySkipped {
                        profile: self.profile.clone(),
                        anilist_id: op.anilist_id,
                        reason: op.reason.clone(),
                    });
                } else {
                    applied += 1;
                    let _ = self.events.send(NotificationEvent::EntryApplied {
                        profile: self.profile.clone(),
                        anilist_id: op.anilist_id,
                        reason: op.reason.clone(),
                    });
                }
            }
        }

        Ok((applied, skipped, failed))
    }
}

/// Groups a batch's flattened `PlexItem`s (one per episode for shows, one per
/// movie) so each show+season is resolved once instead of per episode. Movies
/// always form a singleton group, keyed by rating key so two different movies
/// that happen to share a title+year never merge.
fn group_by_show_and_season(batch: &[PlexItem]) -> Vec<Vec<&PlexItem>> {
    #[derive(PartialEq, Eq, Hash, Clone)]
    enum GroupKey {
        Movie(i64),
        ShowSeason(String, Option<i32>, Option<i32>),
    }

    fn key_for(item: &PlexItem) -> GroupKey {
        if item.item_type == PlexItemType::Movie {
            GroupKey::Movie(item.rating_key)
        } else {
            GroupKey::ShowSeason(item.title.clone(), item.year, item.season_index)
        }
    }

    let mut order: Vec<GroupKey> = Vec::new();
    let mut groups: std::collections::HashMap<GroupKey, Vec<&PlexItem>> = std::collections::HashMap::new();

    for item in batch {
        let key = key_for(item);
        groups.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            Vec::new()
        }).push(item);
    }

    order.into_iter().filter_map(|key| groups.remove(&key)).collect()
}

/// A cloneable handle other tasks (e.g. the webhook endpoint) use to enqueue
/// triggers without holding a reference to the running supervisor.
#[derive(Clone)]
pub struct ProfileHandle {
    dispatch: DispatchQueue,
}

impl ProfileHandle {
    pub async fn trigger(&self, kind: TriggerKind) {
        self.dispatch.enqueue(kind).await;
    }
}

fn interval_or_never(seconds: i64) -> tokio::time::Interval {
    let period = if seconds <= 0 {
        Duration::from_secs(u64::MAX / 2)
    } else {
        Duration::from_secs(seconds.unsigned_abs())
    };
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

fn cooldown_backoff(consecutive_failures: u32) -> Duration {
    let exponent = consecutive_failures.saturating_sub(FAILURE_THRESHOLD).min(6);
    Duration::from_secs(30u64.saturating_mul(1u64 << exponent))
}

async fn scan_mode_for(trigger: TriggerKind, store: &Store, profile: &str) -> ScanMode {
    match trigger {
        TriggerKind::Full => ScanMode::Full,
        TriggerKind::Webhook => ScanMode::RecentlyUpdated,
        TriggerKind::Partial | TriggerKind::Poll => {
            match store
                .get_watermark(profile)
                .await
                .ok()
                .flatten()
                .and_then(|w| w.last_success_at)
            {
                Some(ts) => ScanMode::Since(ts),
                None => ScanMode::Full,
            }
        }
    }
}

impl ProfileConfig {
    fn full_scan_enabled(&self) -> bool {
        self.sync_modes.contains(&crate::config::SyncTrigger::Periodic) && self.sync_interval > 0
    }

    fn uses_poll(&self) -> bool {
        self.sync_modes.contains(&crate::config::SyncTrigger::Poll) && self.sync_interval > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_backoff_grows_but_caps() {
        let first = cooldown_backoff(FAILURE_THRESHOLD);
        let later = cooldown_backoff(FAILURE_THRESHOLD + 10);
        assert!(later >= first);
        assert!(later <= Duration::from_secs(30 * 64));
    }

    #[test]
    fn interval_or_never_handles_disabled_trigger() {
        let interval = interval_or_never(-1);
        assert!(interval.period() > Duration::from_secs(60 * 60 * 24));
    }
}

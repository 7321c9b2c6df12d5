use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::backups::BackupSummary;
pub use repositories::watermarks::Watermark;

use crate::models::anilist_entry::AniListListEntry;
use crate::models::history::{HistoryEvent, SyncOutcome};
use crate::models::mapping::Mapping;
use crate::models::pin::PinRecord;
use crate::models::plan::PlanKind;

/// Thin facade over every repository, mirroring the shape handed to the rest
/// of the engine: callers never see `DatabaseConnection` or entity types.
#[derive(Clone)]
pub struct Store {
    conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.starts_with(":memory:") && !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    fn mappings(&self) -> repositories::mappings::MappingRepository {
        repositories::mappings::MappingRepository::new(self.conn.clone())
    }

    fn history(&self) -> repositories::history::HistoryRepository {
        repositories::history::HistoryRepository::new(self.conn.clone())
    }

    fn pins(&self) -> repositories::pins::PinRepository {
        repositories::pins::PinRepository::new(self.conn.clone())
    }

    fn watermarks(&self) -> repositories::watermarks::WatermarkRepository {
        repositories::watermarks::WatermarkRepository::new(self.conn.clone())
    }

    fn backups(&self) -> repositories::backups::BackupRepository {
        repositories::backups::BackupRepository::new(self.conn.clone())
    }

    // ---- mappings ----

    pub async fn get_mapping(&self, anilist_id: i32) -> Result<Option<Mapping>> {
        self.mappings().get(anilist_id).await
    }

    pub async fn list_mappings(&self) -> Result<Vec<Mapping>> {
        self.mappings().list_all().await
    }

    pub async fn upsert_mapping(&self, mapping: &Mapping) -> Result<()> {
        self.mappings().upsert(mapping).await
    }

    pub async fn replace_authoritative_mappings(&self, mappings: &[Mapping]) -> Result<()> {
        self.mappings().replace_authoritative(mappings).await
    }

    pub async fn find_mappings_by_title_year(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<Mapping>> {
        self.mappings().find_by_title_year(title, year).await
    }

    pub async fn search_mapping_titles(&self, query: &str) -> Result<Vec<i32>> {
        self.mappings().search_titles_fts(query).await
    }

    // ---- history ----

    #[allow(clippy::too_many_arguments)]
    pub async fn record_history(
        &self,
        profile: &str,
        anilist_id: i32,
        plex_rating_key: Option<i64>,
        kind: PlanKind,
        outcome: SyncOutcome,
        before_json: &str,
        after_json: &str,
        changed_fields: &[&'static str],
        reason: &str,
        error: Option<&str>,
    ) -> Result<HistoryEvent> {
        self.history()
            .record(
                profile,
                anilist_id,
                plex_rating_key,
                kind,
                outcome,
                before_json,
                after_json,
                changed_fields,
                reason,
                error,
                None,
            )
            .await
    }

    /// Appends a counter-event reversing `original.id`, leaving the original
    /// row's `undone_at` for the caller to set via `mark_history_undone`.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_undo_event(
        &self,
        original: &HistoryEvent,
        before_json: &str,
        after_json: &str,
        reason: &str,
    ) -> Result<HistoryEvent> {
        self.history()
            .record(
                &original.profile,
                original.anilist_id,
                original.plex_rating_key,
                original.kind,
                SyncOutcome::Applied,
                before_json,
                after_json,
                &[],
                reason,
                None,
                Some(original.id),
            )
            .await
    }

    pub async fn get_history_event(&self, id: i64) -> Result<Option<HistoryEvent>> {
        self.history().get(id).await
    }

    pub async fn list_history(
        &self,
        profile: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<HistoryEvent>> {
        self.history().list_for_profile(profile, limit, offset).await
    }

    pub async fn mark_history_undone(&self, id: i64) -> Result<()> {
        self.history().mark_undone(id).await
    }

    pub async fn delete_history_event(&self, id: i64) -> Result<()> {
        self.history().delete(id).await
    }

    pub async fn prune_history(&self, older_than: Duration) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than)?;
        self.history().prune_older_than(cutoff).await
    }

    // ---- pins ----

    pub async fn pin_field(&self, profile: &str, anilist_id: i32, field: &str) -> Result<()> {
        self.pins().pin(profile, anilist_id, field).await
    }

    pub async fn unpin_field(&self, profile: &str, anilist_id: i32, field: &str) -> Result<()> {
        self.pins().unpin(profile, anilist_id, field).await
    }

    pub async fn pinned_fields(&self, profile: &str, anilist_id: i32) -> Result<Vec<String>> {
        self.pins().pinned_fields(profile, anilist_id).await
    }

    pub async fn list_pins(&self, profile: &str) -> Result<Vec<PinRecord>> {
        self.pins().list_for_profile(profile).await
    }

    // ---- scheduler watermarks ----

    pub async fn get_watermark(&self, profile: &str) -> Result<Option<Watermark>> {
        self.watermarks().get(profile).await
    }

    pub async fn record_run(
        &self,
        profile: &str,
        succeeded: bool,
        error: Option<&str>,
        applied: i32,
        skipped: i32,
        failed: i32,
    ) -> Result<()> {
        self.watermarks()
            .record_run(profile, succeeded, error, applied, skipped, failed)
            .await
    }

    pub async fn list_watermarks(&self) -> Result<Vec<Watermark>> {
        self.watermarks().list_all().await
    }

    // ---- backups ----

    pub async fn create_backup(
        &self,
        profile: &str,
        entries: &[AniListListEntry],
        reason: &str,
    ) -> Result<BackupSummary> {
        self.backups().create(profile, entries, reason).await
    }

    pub async fn list_backups(&self, profile: &str) -> Result<Vec<BackupSummary>> {
        self.backups().list_for_profile(profile).await
    }

    pub async fn load_backup(&self, id: i64) -> Result<Option<Vec<AniListListEntry>>> {
        self.backups().load_payload(id).await
    }

    pub async fn prune_backups(&self, older_than: Duration) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than)?;
        self.backups().prune_older_than(cutoff).await
    }
}

/// Formats a timestamp the way history/backup rows store them.
#[must_use]
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

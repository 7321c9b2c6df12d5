//! Backup/restore: periodic and on-demand snapshots of a profile's full
//! AniList list, restorable wholesale.

use anyhow::{Context, Result};
use tracing::info;

use crate::clients::anilist::AnilistClient;
use crate::db::{BackupSummary, Store};

pub struct BackupService {
    store: Store,
    anilist: AnilistClient,
}

impl BackupService {
    #[must_use]
    pub const fn new(store: Store, anilist: AnilistClient) -> Self {
        Self { store, anilist }
    }

    /// Snapshots the authenticated user's current AniList list.
    pub async fn create_backup(&self, profile: &str, reason: &str) -> Result<BackupSummary> {
        let viewer = self.anilist.get_viewer().await?;
        let entries = self.anilist.get_list(viewer.id).await?;
        let summary = self.store.create_backup(profile, &entries, reason).await?;
        info!(profile, backup_id = summary.id, count = entries.len(), "created backup");
        Ok(summary)
    }

    pub async fn list_backups(&self, profile: &str) -> Result<Vec<BackupSummary>> {
        self.store.list_backups(profile).await
    }

    /// Replays every entry in a stored backup back onto AniList, overwriting
    /// whatever is there now. Does not touch entries absent from the
    /// snapshot — restoring is additive/overwriting, never deleting.
    pub async fn restore_backup(&self, backup_id: i64) -> Result<usize> {
        let entries = self
            .store
            .load_backup(backup_id)
            .await?
            .context("backup not found")?;

        for entry in &entries {
            self.anilist.save_entry(entry).await?;
        }

        info!(backup_id, count = entries.len(), "restored backup");
        Ok(entries.len())
    }

    pub async fn prune_older_than(&self, retention_days: u32) -> Result<u64> {
        let retention = std::time::Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60);
        self.store.prune_backups(retention).await
    }
}

//! Field pins: per-profile, per-media overrides that the Reconciliation
//! Engine treats as additional exclusions on top of a profile's
//! `excluded_sync_fields`.

use anyhow::Result;

use crate::db::Store;
use crate::models::anilist_entry::AniListListEntry;
use crate::models::pin::PinRecord;

pub struct PinService {
    store: Store,
}

impl PinService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn pin(&self, profile: &str, anilist_id: i32, field: &str) -> Result<()> {
        if !AniListListEntry::FIELD_NAMES.contains(&field) {
            anyhow::bail!("unknown list field: {field}");
        }
        self.store.pin_field(profile, anilist_id, field).await
    }

    pub async fn unpin(&self, profile: &str, anilist_id: i32, field: &str) -> Result<()> {
        self.store.unpin_field(profile, anilist_id, field).await
    }

    pub async fn list(&self, profile: &str) -> Result<Vec<PinRecord>> {
        self.store.list_pins(profile).await
    }
}

//! Undo: reverses a single history event by replaying its recorded "before"
//! state back onto AniList.

use anyhow::{Context, Result};
use tracing::info;

use crate::clients::anilist::AnilistClient;
use crate::db::Store;
use crate::models::anilist_entry::AniListListEntry;
use crate::models::history::HistoryEvent;

pub struct UndoService {
    store: Store,
    anilist: AnilistClient,
}

impl UndoService {
    #[must_use]
    pub const fn new(store: Store, anilist: AnilistClient) -> Self {
        Self { store, anilist }
    }

    pub async fn list_history(
        &self,
        profile: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<HistoryEvent>> {
        self.store.list_history(profile, limit, offset).await
    }

    /// Reverses `event_id`, restoring AniList to the state recorded before
    /// that event's write. Fails if the event was never applied, was a
    /// no-op, or has already been undone. Undoing a create (before state is
    /// absent) deletes the entry, which requires `destructive_sync` — the
    /// same rule that gates any other deletion for this profile.
    pub async fn undo(&self, event_id: i64, destructive_sync: bool) -> Result<()> {
        let event = self
            .store
            .get_history_event(event_id)
            .await?
            .context("history event not found")?;

        if !event.is_undoable() {
            anyhow::bail!("history event {event_id} is not undoable");
        }

        let before: AniListListEntry = serde_json::from_str(&event.before_json)
            .context("stored before-state is not valid JSON")?;

        if undo_deletes(&before) {
            if !destructive_sync {
                anyhow::bail!("delete requires destructive_sync");
            }
            self.anilist.delete_entry(event.anilist_id).await?;
        } else {
            self.anilist.save_entry(&before).await?;
        }

        // Events are append-only: the original row gets `undone_at` set, and
        // a new counter-event is inserted recording the reversal itself
        // (after/before swapped relative to the original).
        self.store
            .record_undo_event(
                &event,
                &event.after_json,
                &event.before_json,
                &format!("undo of event {event_id}"),
            )
            .await?;
        self.store.mark_history_undone(event_id).await?;
        info!(event_id, anilist_id = event.anilist_id, "undid history event");
        Ok(())
    }
}

/// Undoing an event whose recorded before-state is absent means the event
/// created the entry, so undoing it must delete that entry.
#[must_use]
pub fn undo_deletes(before: &AniListListEntry) -> bool {
    *before == AniListListEntry::absent(before.media_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::plan::PlanKind;

    fn undoable_event() -> HistoryEvent {
        HistoryEvent {
            id: 1,
            profile: "default".to_string(),
            anilist_id: 1,
            plex_rating_key: Some(1),
            kind: PlanKind::Upsert,
            outcome: crate::models::history::SyncOutcome::Applied,
            before_json: serde_json::to_string(&AniListListEntry::absent(1)).unwrap(),
            after_json: "{}".to_string(),
            changed_fields: vec!["progress".to_string()],
            reason: String::new(),
            error: None,
            created_at: chrono::Utc::now(),
            undone_at: None,
            undoes_event_id: None,
        }
    }

    #[test]
    fn before_state_round_trips_through_json() {
        let event = undoable_event();
        let before: AniListListEntry = serde_json::from_str(&event.before_json).unwrap();
        assert_eq!(before, AniListListEntry::absent(1));
    }
}

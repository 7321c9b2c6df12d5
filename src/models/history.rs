use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plan::PlanKind;

/// Result of attempting to apply a `PlanOp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    Applied,
    Skipped,
    Failed,
}

/// A single persisted record of a sync decision, whether or not it resulted
/// in a write. Forms the audit trail the Undo subsystem replays against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub id: i64,
    pub profile: String,
    pub anilist_id: i32,
    pub plex_rating_key: Option<i64>,
    pub kind: PlanKind,
    pub outcome: SyncOutcome,
    pub before_json: String,
    pub after_json: String,
    pub changed_fields: Vec<String>,
    pub reason: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set once this event has been reversed by Undo; prevents double-undo.
    pub undone_at: Option<DateTime<Utc>>,
    /// Set on the counter-event Undo appends, referencing the event it
    /// reverses. `None` for every ordinary sync-produced event.
    pub undoes_event_id: Option<i64>,
}

impl HistoryEvent {
    #[must_use]
    pub fn is_undoable(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Applied)
            && !matches!(self.kind, PlanKind::NoOp)
            && self.undone_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(outcome: SyncOutcome, kind: PlanKind, undone: bool) -> HistoryEvent {
        HistoryEvent {
            id: 1,
            profile: "default".to_string(),
            anilist_id: 1,
            plex_rating_key: Some(1),
            kind,
            outcome,
            before_json: "{}".to_string(),
            after_json: "{}".to_string(),
            changed_fields: vec![],
            reason: String::new(),
            error: None,
            created_at: chrono::DateTime::UNIX_EPOCH,
            undone_at: if undone {
                Some(chrono::DateTime::UNIX_EPOCH)
            } else {
                None
            },
            undoes_event_id: None,
        }
    }

    #[test]
    fn only_applied_non_noop_not_yet_undone_is_undoable() {
        assert!(sample(SyncOutcome::Applied, PlanKind::Upsert, false).is_undoable());
        assert!(!sample(SyncOutcome::Skipped, PlanKind::Upsert, false).is_undoable());
        assert!(!sample(SyncOutcome::Applied, PlanKind::NoOp, false).is_undoable());
        assert!(!sample(SyncOutcome::Applied, PlanKind::Upsert, true).is_undoable());
    }
}

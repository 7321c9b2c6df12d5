use serde::{Deserialize, Serialize};

use super::AniListListEntry;

/// The kind of write the Reconciliation Engine wants to make against
/// AniList for one media id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanKind {
    /// Create or update a list entry (status/progress/score/notes/dates).
    Upsert,
    /// Remove the list entry entirely (only emitted under destructive sync).
    Delete,
    /// No write is needed; the observed state already matches policy.
    NoOp,
}

/// One planned write against AniList, carrying both the before/after entry
/// state so the History subsystem can record a diff and Undo can reverse it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOp {
    pub anilist_id: i32,
    pub kind: PlanKind,
    pub before: AniListListEntry,
    pub after: AniListListEntry,
    /// Field names (from `AniListListEntry::FIELD_NAMES`) this op actually
    /// changes; empty for `PlanKind::NoOp`.
    pub changed_fields: Vec<&'static str>,
    /// Human-readable reason surfaced in history/logs, e.g. "progress 3 -> 7".
    pub reason: String,
}

impl PlanOp {
    #[must_use]
    pub fn no_op(entry: AniListListEntry) -> Self {
        Self {
            anilist_id: entry.media_id,
            kind: PlanKind::NoOp,
            before: entry.clone(),
            after: entry,
            changed_fields: Vec::new(),
            reason: "already in sync".to_string(),
        }
    }

    #[must_use]
    pub fn is_no_op(&self) -> bool {
        matches!(self.kind, PlanKind::NoOp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_op_carries_identical_before_and_after() {
        let entry = AniListListEntry::absent(42);
        let op = PlanOp::no_op(entry.clone());
        assert!(op.is_no_op());
        assert_eq!(op.before, entry);
        assert_eq!(op.after, entry);
        assert!(op.changed_fields.is_empty());
    }
}

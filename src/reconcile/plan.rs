//! Pure diffing of current vs. target AniList state into a `PlanOp`.

use crate::models::anilist_entry::AniListListEntry;
use crate::models::plan::{PlanKind, PlanOp};

/// Compares `current` (possibly absent) against `target` (`None` means
/// delete) and produces the op the Reconciliation Engine should execute.
#[must_use]
pub fn diff_plan(
    media_id: i32,
    current: Option<&AniListListEntry>,
    target: Option<&AniListListEntry>,
) -> PlanOp {
    let before = current
        .cloned()
        .unwrap_or_else(|| AniListListEntry::absent(media_id));

    match (current, target) {
        (Some(_), None) => PlanOp {
            anilist_id: media_id,
            kind: PlanKind::Delete,
            before: before.clone(),
            after: AniListListEntry::absent(media_id),
            changed_fields: Vec::new(),
            reason: "removed from Plex library under destructive sync".to_string(),
        },
        (None, None) => PlanOp::no_op(AniListListEntry::absent(media_id)),
        (current, Some(target)) => {
            let changed = changed_fields(current, target);
            if changed.is_empty() {
                PlanOp::no_op(target.clone())
            } else {
                PlanOp {
                    anilist_id: media_id,
                    kind: PlanKind::Upsert,
                    before,
                    after: target.clone(),
                    reason: describe_changes(current, target, &changed),
                    changed_fields: changed,
                }
            }
        }
    }
}

fn changed_fields(
    current: Option<&AniListListEntry>,
    target: &AniListListEntry,
) -> Vec<&'static str> {
    let empty = AniListListEntry::absent(target.media_id);
    let before = current.unwrap_or(&empty);

    let mut fields = Vec::new();
    if before.status != target.status {
        fields.push("status");
    }
    if before.progress != target.progress {
        fields.push("progress");
    }
    if before.repeat != target.repeat {
        fields.push("repeat");
    }
    if before.score != target.score {
        fields.push("score");
    }
    if before.notes != target.notes {
        fields.push("notes");
    }
    if before.started_at != target.started_at {
        fields.push("started_at");
    }
    if before.completed_at != target.completed_at {
        fields.push("completed_at");
    }
    fields
}

fn describe_changes(
    current: Option<&AniListListEntry>,
    target: &AniListListEntry,
    changed: &[&'static str],
) -> String {
    let empty = AniListListEntry::absent(target.media_id);
    let before = current.unwrap_or(&empty);

    changed
        .iter()
        .map(|field| match *field {
            "progress" => format!("progress {} -> {}", before.progress, target.progress),
            "status" => format!("status {:?} -> {:?}", before.status, target.status),
            "repeat" => format!("repeat {} -> {}", before.repeat, target.repeat),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_states_produce_noop() {
        let entry = AniListListEntry::absent(1);
        let op = diff_plan(1, Some(&entry), Some(&entry));
        assert!(op.is_no_op());
    }

    #[test]
    fn progress_change_produces_upsert_with_reason() {
        let before = AniListListEntry::absent(1);
        let mut after = before.clone();
        after.progress = 5;
        let op = diff_plan(1, Some(&before), Some(&after));
        assert_eq!(op.kind, PlanKind::Upsert);
        assert_eq!(op.changed_fields, vec!["progress"]);
        assert!(op.reason.contains("0 -> 5"));
    }

    #[test]
    fn none_target_with_present_current_is_delete() {
        let before = AniListListEntry::absent(1);
        let op = diff_plan(1, Some(&before), None);
        assert_eq!(op.kind, PlanKind::Delete);
    }

    #[test]
    fn idempotent_on_repeated_application() {
        let before = AniListListEntry::absent(1);
        let mut after = before.clone();
        after.progress = 5;
        let first = diff_plan(1, Some(&before), Some(&after));
        let second = diff_plan(1, Some(&after), Some(&after));
        assert!(!first.is_no_op());
        assert!(second.is_no_op());
    }
}

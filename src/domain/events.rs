//! Events broadcast on the in-process notification bus.
//!
//! These are sent via `tokio::sync::broadcast` to connected clients as
//! Server-Sent Events; see `crate::api::events`.

use serde::Serialize;

/// Events sent to connected clients via SSE.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum NotificationEvent {
    ProfileSyncStarted {
        profile: String,
    },
    ProfileSyncFinished {
        profile: String,
        applied: i32,
        skipped: i32,
        failed: i32,
        duration_ms: i64,
    },
    ProfileSyncProgress {
        profile: String,
        current: usize,
        total: usize,
    },

    MappingRefreshStarted,
    MappingRefreshFinished {
        count: i32,
    },

    EntryApplied {
        profile: String,
        anilist_id: i32,
        reason: String,
    },
    EntrySkipped {
        profile: String,
        anilist_id: i32,
        reason: String,
    },

    BackupCreated {
        profile: String,
        backup_id: i64,
    },
    UndoCompleted {
        profile: String,
        history_event_id: i64,
    },

    Error {
        message: String,
    },
    Info {
        message: String,
    },
}

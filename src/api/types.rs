use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusDto {
    pub version: String,
    pub uptime_seconds: u64,
    pub profiles: Vec<ProfileStatusDto>,
}

#[derive(Debug, Serialize)]
pub struct ProfileStatusDto {
    pub name: String,
    pub state: String,
    pub last_run_at: Option<String>,
    pub last_success_at: Option<String>,
    pub last_error: Option<String>,
    pub last_applied: i32,
    pub last_skipped: i32,
    pub last_failed: i32,
}

#[derive(Debug, Serialize)]
pub struct HistoryEventDto {
    pub id: i64,
    pub anilist_id: i32,
    pub plex_rating_key: Option<i64>,
    pub kind: String,
    pub outcome: String,
    pub changed_fields: Vec<String>,
    pub reason: String,
    pub error: Option<String>,
    pub created_at: String,
    pub undone_at: Option<String>,
    pub undoable: bool,
}

#[derive(Debug, Serialize)]
pub struct BackupDto {
    pub id: i64,
    pub created_at: String,
    pub entry_count: i32,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct MappingDto {
    pub anilist_id: i32,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub custom: bool,
}

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub full: bool,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct MappingSearchQuery {
    pub q: String,
}

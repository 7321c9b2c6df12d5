use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use crate::entities::scheduler_watermarks::{self, Entity as SchedulerWatermarks};

/// Per-profile scheduler bookkeeping: when it last ran, whether that run
/// succeeded, and the tallies surfaced by the status API.
#[derive(Debug, Clone)]
pub struct Watermark {
    pub profile: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_applied: i32,
    pub last_skipped: i32,
    pub last_failed: i32,
}

pub struct WatermarkRepository {
    conn: DatabaseConnection,
}

impl WatermarkRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn model_to_watermark(model: scheduler_watermarks::Model) -> Watermark {
        Watermark {
            profile: model.profile,
            last_run_at: model.last_run_at.and_then(|s| s.parse().ok()),
            last_success_at: model.last_success_at.and_then(|s| s.parse().ok()),
            last_error: model.last_error,
            last_applied: model.last_applied,
            last_skipped: model.last_skipped,
            last_failed: model.last_failed,
        }
    }

    pub async fn get(&self, profile: &str) -> anyhow::Result<Option<Watermark>> {
        let row = SchedulerWatermarks::find_by_id(profile.to_string())
            .one(&self.conn)
            .await?;
        Ok(row.map(Self::model_to_watermark))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn record_run(
        &self,
        profile: &str,
        succeeded: bool,
        error: Option<&str>,
        applied: i32,
        skipped: i32,
        failed: i32,
    ) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        let existing = SchedulerWatermarks::find_by_id(profile.to_string())
            .one(&self.conn)
            .await?;

        let mut active = existing.map_or_else(
            || scheduler_watermarks::ActiveModel {
                profile: Set(profile.to_string()),
                last_run_at: Set(None),
                last_success_at: Set(None),
                last_error: Set(None),
                last_applied: Set(0),
                last_skipped: Set(0),
                last_failed: Set(0),
            },
            Into::into,
        );

        active.last_run_at = Set(Some(now.clone()));
        if succeeded {
            active.last_success_at = Set(Some(now));
            active.last_error = Set(None);
        } else {
            active.last_error = Set(error.map(str::to_string));
        }
        active.last_applied = Set(applied);
        active.last_skipped = Set(skipped);
        active.last_failed = Set(failed);

        scheduler_watermarks::Entity::insert(active)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(scheduler_watermarks::Column::Profile)
                    .update_columns([
                        scheduler_watermarks::Column::LastRunAt,
                        scheduler_watermarks::Column::LastSuccessAt,
                        scheduler_watermarks::Column::LastError,
                        scheduler_watermarks::Column::LastApplied,
                        scheduler_watermarks::Column::LastSkipped,
                        scheduler_watermarks::Column::LastFailed,
                    ])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn list_all(&self) -> anyhow::Result<Vec<Watermark>> {
        let rows = SchedulerWatermarks::find().all(&self.conn).await?;
        Ok(rows.into_iter().map(Self::model_to_watermark).collect())
    }
}

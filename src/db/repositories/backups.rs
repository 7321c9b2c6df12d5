use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::backups::{self, Entity as Backups};
use crate::models::anilist_entry::AniListListEntry;

#[derive(Debug, Clone)]
pub struct BackupSummary {
    pub id: i64,
    pub profile: String,
    pub created_at: DateTime<Utc>,
    pub entry_count: i32,
    pub reason: String,
}

pub struct BackupRepository {
    conn: DatabaseConnection,
}

impl BackupRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn model_to_summary(model: &backups::Model) -> anyhow::Result<BackupSummary> {
        Ok(BackupSummary {
            id: model.id,
            profile: model.profile.clone(),
            created_at: model.created_at.parse()?,
            entry_count: model.entry_count,
            reason: model.reason.clone(),
        })
    }

    pub async fn create(
        &self,
        profile: &str,
        entries: &[AniListListEntry],
        reason: &str,
    ) -> anyhow::Result<BackupSummary> {
        let payload_json = serde_json::to_string(entries)?;
        let active = backups::ActiveModel {
            id: sea_orm::NotSet,
            profile: Set(profile.to_string()),
            created_at: Set(Utc::now().to_rfc3339()),
            entry_count: Set(i32::try_from(entries.len()).unwrap_or(i32::MAX)),
            payload_json: Set(payload_json),
            reason: Set(reason.to_string()),
        };
        let inserted = active.insert(&self.conn).await?;
        Self::model_to_summary(&inserted)
    }

    pub async fn list_for_profile(&self, profile: &str) -> anyhow::Result<Vec<BackupSummary>> {
        let rows = Backups::find()
            .filter(backups::Column::Profile.eq(profile))
            .order_by_desc(backups::Column::CreatedAt)
            .all(&self.conn)
            .await?;
        rows.iter().map(Self::model_to_summary).collect()
    }

    pub async fn load_payload(&self, id: i64) -> anyhow::Result<Option<Vec<AniListListEntry>>> {
        let row = Backups::find_by_id(id).one(&self.conn).await?;
        row.map(|m| Ok(serde_json::from_str(&m.payload_json)?))
            .transpose()
    }

    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = Backups::delete_many()
            .filter(backups::Column::CreatedAt.lt(cutoff.to_rfc3339()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}

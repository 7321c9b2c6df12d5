use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::pin_records::{self, Entity as PinRecords};
use crate::models::pin::PinRecord;

pub struct PinRepository {
    conn: DatabaseConnection,
}

impl PinRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn model_to_pin(model: pin_records::Model) -> anyhow::Result<PinRecord> {
        Ok(PinRecord {
            profile: model.profile,
            anilist_id: model.anilist_id,
            field: model.field,
            pinned_at: model.pinned_at.parse()?,
        })
    }

    pub async fn pin(&self, profile: &str, anilist_id: i32, field: &str) -> anyhow::Result<()> {
        let active = pin_records::ActiveModel {
            profile: Set(profile.to_string()),
            anilist_id: Set(anilist_id),
            field: Set(field.to_string()),
            pinned_at: Set(Utc::now().to_rfc3339()),
        };
        PinRecords::insert(active)
            .on_conflict(
                sea_orm::sea_query::OnConflict::columns([
                    pin_records::Column::Profile,
                    pin_records::Column::AnilistId,
                    pin_records::Column::Field,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn unpin(&self, profile: &str, anilist_id: i32, field: &str) -> anyhow::Result<()> {
        PinRecords::delete_many()
            .filter(pin_records::Column::Profile.eq(profile))
            .filter(pin_records::Column::AnilistId.eq(anilist_id))
            .filter(pin_records::Column::Field.eq(field))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Pinned field names for one entry, in the representation the
    /// Reconciliation Engine checks before planning a write.
    pub async fn pinned_fields(
        &self,
        profile: &str,
        anilist_id: i32,
    ) -> anyhow::Result<Vec<String>> {
        let rows = PinRecords::find()
            .filter(pin_records::Column::Profile.eq(profile))
            .filter(pin_records::Column::AnilistId.eq(anilist_id))
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(|r| r.field).collect())
    }

    pub async fn list_for_profile(&self, profile: &str) -> anyhow::Result<Vec<PinRecord>> {
        let rows = PinRecords::find()
            .filter(pin_records::Column::Profile.eq(profile))
            .all(&self.conn)
            .await?;
        rows.into_iter().map(Self::model_to_pin).collect()
    }
}

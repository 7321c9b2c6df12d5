use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::entities::history_events::{self, Entity as HistoryEvents};
use crate::models::history::{HistoryEvent, SyncOutcome};
use crate::models::plan::PlanKind;

pub struct HistoryRepository {
    conn: DatabaseConnection,
}

fn kind_to_str(kind: PlanKind) -> &'static str {
    match kind {
        PlanKind::Upsert => "upsert",
        PlanKind::Delete => "delete",
        PlanKind::NoOp => "noop",
    }
}

fn kind_from_str(raw: &str) -> PlanKind {
    match raw {
        "delete" => PlanKind::Delete,
        "noop" => PlanKind::NoOp,
        _ => PlanKind::Upsert,
    }
}

fn outcome_to_str(outcome: SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::Applied => "applied",
        SyncOutcome::Skipped => "skipped",
        SyncOutcome::Failed => "failed",
    }
}

fn outcome_from_str(raw: &str) -> SyncOutcome {
    match raw {
        "applied" => SyncOutcome::Applied,
        "failed" => SyncOutcome::Failed,
        _ => SyncOutcome::Skipped,
    }
}

impl HistoryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn model_to_event(model: history_events::Model) -> anyhow::Result<HistoryEvent> {
        Ok(HistoryEvent {
            id: model.id,
            profile: model.profile,
            anilist_id: model.anilist_id,
            plex_rating_key: model.plex_rating_key,
            kind: kind_from_str(&model.kind),
            outcome: outcome_from_str(&model.outcome),
            before_json: model.before_json,
            after_json: model.after_json,
            changed_fields: serde_json::from_str(&model.changed_fields).unwrap_or_default(),
            reason: model.reason,
            error: model.error,
            created_at: model.created_at.parse()?,
            undone_at: model.undone_at.map(|s| s.parse()).transpose()?,
            undoes_event_id: model.undoes_event_id,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        profile: &str,
        anilist_id: i32,
        plex_rating_key: Option<i64>,
        kind: PlanKind,
        outcome: SyncOutcome,
        before_json: &str,
        after_json: &str,
        changed_fields: &[&'static str],
        reason: &str,
        error: Option<&str>,
        undoes_event_id: Option<i64>,
    ) -> anyhow::Result<HistoryEvent> {
        let active = history_events::ActiveModel {
            id: sea_orm::NotSet,
            profile: Set(profile.to_string()),
            anilist_id: Set(anilist_id),
            plex_rating_key: Set(plex_rating_key),
            kind: Set(kind_to_str(kind).to_string()),
            outcome: Set(outcome_to_str(outcome).to_string()),
            before_json: Set(before_json.to_string()),
            after_json: Set(after_json.to_string()),
            changed_fields: Set(serde_json::to_string(changed_fields)?),
            reason: Set(reason.to_string()),
            error: Set(error.map(str::to_string)),
            created_at: Set(Utc::now().to_rfc3339()),
            undone_at: Set(None),
            undoes_event_id: Set(undoes_event_id),
        };
        let inserted = active.insert(&self.conn).await?;
        Self::model_to_event(inserted)
    }

    pub async fn get(&self, id: i64) -> anyhow::Result<Option<HistoryEvent>> {
        let row = HistoryEvents::find_by_id(id).one(&self.conn).await?;
        row.map(Self::model_to_event).transpose()
    }

    pub async fn list_for_profile(
        &self,
        profile: &str,
        limit: u64,
        offset: u64,
    ) -> anyhow::Result<Vec<HistoryEvent>> {
        let rows = HistoryEvents::find()
            .filter(history_events::Column::Profile.eq(profile))
            .order_by_desc(history_events::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.conn)
            .await?;
        rows.into_iter().map(Self::model_to_event).collect()
    }

    pub async fn mark_undone(&self, id: i64) -> anyhow::Result<()> {
        if let Some(model) = HistoryEvents::find_by_id(id).one(&self.conn).await? {
            let mut active: history_events::ActiveModel = model.into();
            active.undone_at = Set(Some(Utc::now().to_rfc3339()));
            active.update(&self.conn).await?;
        }
        Ok(())
    }

    pub async fn prune_older_than(&self, cutoff: chrono::DateTime<Utc>) -> anyhow::Result<u64> {
        let result = HistoryEvents::delete_many()
            .filter(history_events::Column::CreatedAt.lt(cutoff.to_rfc3339()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn delete(&self, id: i64) -> anyhow::Result<()> {
        HistoryEvents::delete_by_id(id).exec(&self.conn).await?;
        Ok(())
    }
}

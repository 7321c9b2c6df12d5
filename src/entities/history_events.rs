use sea_orm::entity::prelude::*;

/// Persisted row for one `HistoryEvent`. `kind`/`outcome` are stored as their
/// `Display` spelling; `before_json`/`after_json` hold the full
/// `AniListListEntry` snapshot for Undo to replay against.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "history_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub profile: String,
    pub anilist_id: i32,
    pub plex_rating_key: Option<i64>,
    pub kind: String,
    pub outcome: String,
    pub before_json: String,
    pub after_json: String,
    pub changed_fields: String,
    pub reason: String,
    pub error: Option<String>,
    pub created_at: String,
    pub undone_at: Option<String>,
    /// Id of the event this one reverses, set only on Undo's append-only
    /// counter-event rows.
    pub undoes_event_id: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;

/// A point-in-time snapshot of a profile's AniList list, taken before a sync
/// run writes to it. `payload_json` holds a `Vec<AniListListEntry>`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "backups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub profile: String,
    pub created_at: String,
    pub entry_count: i32,
    pub payload_json: String,
    pub reason: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

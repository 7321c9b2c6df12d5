use sea_orm::entity::prelude::*;

/// Persisted row for one pinned field on one profile's AniList entry.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pin_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub profile: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub anilist_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub field: String,
    pub pinned_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

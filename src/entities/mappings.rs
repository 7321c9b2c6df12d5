use sea_orm::entity::prelude::*;

/// Persisted row for one AniList-id-keyed mapping. List fields (`tmdb_movie_id`,
/// `imdb_id`, season-range tables, ...) are stored as JSON text; see
/// `crate::db::repositories::mappings` for the `Model <-> Mapping` conversion.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "mappings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub anilist_id: i32,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub anidb_id: Option<i32>,
    pub tvdb_id: Option<i32>,
    pub tmdb_movie_id: Option<String>,
    pub tmdb_show_id: Option<String>,
    pub imdb_id: Option<String>,
    pub mal_id: Option<String>,
    pub tvdb_season_ranges: Option<String>,
    pub tmdb_season_ranges: Option<String>,
    pub sources: Option<String>,
    pub custom: bool,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

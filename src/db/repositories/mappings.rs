use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, Statement};

use crate::entities::mappings::{self, Entity as Mappings};
use crate::models::mapping::{Mapping, SeasonRangeTable};

pub struct MappingRepository {
    conn: DatabaseConnection,
}

fn encode_season_ranges(table: &SeasonRangeTable) -> anyhow::Result<String> {
    Ok(serde_json::to_string(table)?)
}

fn decode_season_ranges(raw: Option<&str>) -> SeasonRangeTable {
    raw.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

fn encode_list<T: serde::Serialize>(items: &[T]) -> anyhow::Result<Option<String>> {
    if items.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(items)?))
    }
}

fn decode_list<T: serde::de::DeserializeOwned>(raw: Option<&str>) -> Vec<T> {
    raw.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

impl MappingRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn model_to_mapping(model: mappings::Model) -> Mapping {
        Mapping {
            anilist_id: model.anilist_id,
            title: model.title,
            year: model.year,
            anidb_id: model.anidb_id,
            tvdb_id: model.tvdb_id,
            tmdb_movie_id: decode_list(model.tmdb_movie_id.as_deref()),
            tmdb_show_id: decode_list(model.tmdb_show_id.as_deref()),
            imdb_id: decode_list(model.imdb_id.as_deref()),
            mal_id: decode_list(model.mal_id.as_deref()),
            tvdb_season_ranges: decode_season_ranges(model.tvdb_season_ranges.as_deref()),
            tmdb_season_ranges: decode_season_ranges(model.tmdb_season_ranges.as_deref()),
            sources: decode_list(model.sources.as_deref()),
            custom: model.custom,
            includes: Vec::new(),
        }
    }

    fn mapping_to_active_model(mapping: &Mapping) -> anyhow::Result<mappings::ActiveModel> {
        Ok(mappings::ActiveModel {
            anilist_id: Set(mapping.anilist_id),
            title: Set(mapping.title.clone()),
            year: Set(mapping.year),
            anidb_id: Set(mapping.anidb_id),
            tvdb_id: Set(mapping.tvdb_id),
            tmdb_movie_id: Set(encode_list(&mapping.tmdb_movie_id)?),
            tmdb_show_id: Set(encode_list(&mapping.tmdb_show_id)?),
            imdb_id: Set(encode_list(&mapping.imdb_id)?),
            mal_id: Set(encode_list(&mapping.mal_id)?),
            tvdb_season_ranges: Set(Some(encode_season_ranges(&mapping.tvdb_season_ranges)?)),
            tmdb_season_ranges: Set(Some(encode_season_ranges(&mapping.tmdb_season_ranges)?)),
            sources: Set(encode_list(&mapping.sources)?),
            custom: Set(mapping.custom),
            updated_at: Set(Utc::now().to_rfc3339()),
        })
    }

    pub async fn get(&self, anilist_id: i32) -> anyhow::Result<Option<Mapping>> {
        let row = Mappings::find_by_id(anilist_id).one(&self.conn).await?;
        Ok(row.map(Self::model_to_mapping))
    }

    pub async fn list_all(&self) -> anyhow::Result<Vec<Mapping>> {
        let rows = Mappings::find().all(&self.conn).await?;
        Ok(rows.into_iter().map(Self::model_to_mapping).collect())
    }

    pub async fn upsert(&self, mapping: &Mapping) -> anyhow::Result<()> {
        let active = Self::mapping_to_active_model(mapping)?;
        Mappings::insert(active)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(mappings::Column::AnilistId)
                    .update_columns([
                        mappings::Column::Title,
                        mappings::Column::Year,
                        mappings::Column::AnidbId,
                        mappings::Column::TvdbId,
                        mappings::Column::TmdbMovieId,
                        mappings::Column::TmdbShowId,
                        mappings::Column::ImdbId,
                        mappings::Column::MalId,
                        mappings::Column::TvdbSeasonRanges,
                        mappings::Column::TmdbSeasonRanges,
                        mappings::Column::Sources,
                        mappings::Column::Custom,
                        mappings::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Bulk-replaces the authoritative portion of the store in one
    /// transaction, used by the database-sync job. Rows whose `custom` flag
    /// is set are never touched here; they only change via custom-file
    /// re-merge.
    pub async fn replace_authoritative(&self, mappings: &[Mapping]) -> anyhow::Result<()> {
        use sea_orm::TransactionTrait;

        let txn = self.conn.begin().await?;
        for mapping in mappings {
            let active = Self::mapping_to_active_model(mapping)?;
            mappings::Entity::insert(active)
                .on_conflict(
                    sea_orm::sea_query::OnConflict::column(mappings::Column::AnilistId)
                        .update_columns([
                            mappings::Column::Title,
                            mappings::Column::Year,
                            mappings::Column::AnidbId,
                            mappings::Column::TvdbId,
                            mappings::Column::TmdbMovieId,
                            mappings::Column::TmdbShowId,
                            mappings::Column::ImdbId,
                            mappings::Column::MalId,
                            mappings::Column::TvdbSeasonRanges,
                            mappings::Column::TmdbSeasonRanges,
                            mappings::Column::Sources,
                            mappings::Column::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .exec(&txn)
                .await?;
        }
        txn.commit().await?;
        Ok(())
    }

    pub async fn find_by_title_year(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> anyhow::Result<Vec<Mapping>> {
        let mut query = Mappings::find().filter(mappings::Column::Title.eq(title));
        if let Some(year) = year {
            query = query.filter(mappings::Column::Year.eq(year));
        }
        let rows = query.all(&self.conn).await?;
        Ok(rows.into_iter().map(Self::model_to_mapping).collect())
    }

    /// Queries the FTS5 shadow table and returns the matching AniList ids in
    /// relevance order, for the free-text term of the Booru query engine.
    pub async fn search_titles_fts(&self, query: &str) -> anyhow::Result<Vec<i32>> {
        let db = &self.conn;
        let stmt = Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT m.anilist_id FROM mapping_titles_fts f \
             JOIN mappings m ON m.rowid = f.rowid \
             WHERE mapping_titles_fts MATCH $1 ORDER BY rank",
            [query.into()],
        );
        let rows = db.query_all(stmt).await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.try_get::<i32>("", "anilist_id")?);
        }
        Ok(ids)
    }
}

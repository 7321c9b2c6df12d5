use sea_orm_migration::prelude::*;

/// Adds an FTS5 virtual table mirroring `mappings.title`, kept in sync by
/// triggers rather than application code so every write path (database-sync
/// refresh, custom overrides) stays indexed automatically.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();

        conn.execute_unprepared(
            "CREATE VIRTUAL TABLE IF NOT EXISTS mapping_titles_fts USING fts5( \
                title, \
                content='mappings', \
                content_rowid='rowid' \
            )",
        )
        .await?;

        conn.execute_unprepared(
            "CREATE TRIGGER IF NOT EXISTS mappings_fts_insert AFTER INSERT ON mappings BEGIN \
                INSERT INTO mapping_titles_fts(rowid, title) VALUES (new.rowid, new.title); \
            END",
        )
        .await?;

        conn.execute_unprepared(
            "CREATE TRIGGER IF NOT EXISTS mappings_fts_update AFTER UPDATE ON mappings BEGIN \
                INSERT INTO mapping_titles_fts(mapping_titles_fts, rowid, title) VALUES ('delete', old.rowid, old.title); \
                INSERT INTO mapping_titles_fts(rowid, title) VALUES (new.rowid, new.title); \
            END",
        )
        .await?;

        conn.execute_unprepared(
            "CREATE TRIGGER IF NOT EXISTS mappings_fts_delete AFTER DELETE ON mappings BEGIN \
                INSERT INTO mapping_titles_fts(mapping_titles_fts, rowid, title) VALUES ('delete', old.rowid, old.title); \
            END",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        conn.execute_unprepared("DROP TRIGGER IF EXISTS mappings_fts_delete")
            .await?;
        conn.execute_unprepared("DROP TRIGGER IF EXISTS mappings_fts_update")
            .await?;
        conn.execute_unprepared("DROP TRIGGER IF EXISTS mappings_fts_insert")
            .await?;
        conn.execute_unprepared("DROP TABLE IF EXISTS mapping_titles_fts")
            .await?;
        Ok(())
    }
}

use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Mappings)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(HistoryEvents)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(PinRecords)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(SchedulerWatermarks)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Backups)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_history_events_profile_anilist")
                    .table(HistoryEvents)
                    .col(crate::entities::history_events::Column::Profile)
                    .col(crate::entities::history_events::Column::AnilistId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_backups_profile_created")
                    .table(Backups)
                    .col(crate::entities::backups::Column::Profile)
                    .col(crate::entities::backups::Column::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Backups).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SchedulerWatermarks).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PinRecords).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(HistoryEvents).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Mappings).to_owned())
            .await?;

        Ok(())
    }
}

use sea_orm_migration::prelude::*;

use crate::entities::history_events::Entity as HistoryEvents;

/// Adds the column Undo's append-only counter-events use to reference the
/// event they reverse.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum HistoryEventsCol {
    UndoesEventId,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(HistoryEvents)
                    .add_column(ColumnDef::new(HistoryEventsCol::UndoesEventId).big_integer().null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(HistoryEvents)
                    .drop_column(HistoryEventsCol::UndoesEventId)
                    .to_owned(),
            )
            .await
    }
}

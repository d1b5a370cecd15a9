//! Create `system_message` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SystemMessage::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SystemMessage::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SystemMessage::ChannelId).string_len(36).not_null())
                    .col(ColumnDef::new(SystemMessage::Kind).string_len(64).not_null())
                    .col(ColumnDef::new(SystemMessage::Payload).json().not_null())
                    .col(ColumnDef::new(SystemMessage::ActorId).string_len(36))
                    .col(
                        ColumnDef::new(SystemMessage::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_system_message_channel")
                            .from(SystemMessage::Table, SystemMessage::ChannelId)
                            .to(Channel::Table, Channel::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_system_message_channel_created_at")
                    .table(SystemMessage::Table)
                    .col(SystemMessage::ChannelId)
                    .col(SystemMessage::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SystemMessage::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SystemMessage {
    Table,
    Id,
    ChannelId,
    Kind,
    Payload,
    ActorId,
    CreatedAt,
}

#[derive(Iden)]
enum Channel {
    Table,
    Id,
}

//! Create `message_pin` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MessagePin::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MessagePin::ChannelId).string_len(36).not_null())
                    .col(ColumnDef::new(MessagePin::MessageId).string_len(36).not_null())
                    .col(ColumnDef::new(MessagePin::PinnedBy).string_len(36).not_null())
                    .col(
                        ColumnDef::new(MessagePin::PinnedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(MessagePin::ChannelId)
                            .col(MessagePin::MessageId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_pin_channel")
                            .from(MessagePin::Table, MessagePin::ChannelId)
                            .to(Channel::Table, Channel::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_pin_message")
                            .from(MessagePin::Table, MessagePin::MessageId)
                            .to(Message::Table, Message::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MessagePin::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MessagePin {
    Table,
    ChannelId,
    MessageId,
    PinnedBy,
    PinnedAt,
}

#[derive(Iden)]
enum Channel {
    Table,
    Id,
}

#[derive(Iden)]
enum Message {
    Table,
    Id,
}

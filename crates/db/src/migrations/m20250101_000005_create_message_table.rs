//! Create message table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Message::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Message::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Message::ChannelId).string_len(36).not_null())
                    .col(ColumnDef::new(Message::UserId).string_len(36).not_null())
                    .col(ColumnDef::new(Message::ParentId).string_len(36))
                    .col(ColumnDef::new(Message::Body).text().not_null())
                    .col(
                        ColumnDef::new(Message::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Message::EditedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Message::DeletedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Message::DeletedBy).string_len(36))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_channel")
                            .from(Message::Table, Message::ChannelId)
                            .to(Channel::Table, Channel::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_user")
                            .from(Message::Table, Message::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_parent")
                            .from(Message::Table, Message::ParentId)
                            .to(Message::Table, Message::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (channel_id, created_at) - history paging and unread counts
        manager
            .create_index(
                Index::create()
                    .name("idx_message_channel_created_at")
                    .table(Message::Table)
                    .col(Message::ChannelId)
                    .col(Message::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: (parent_id, created_at) - thread listing
        manager
            .create_index(
                Index::create()
                    .name("idx_message_parent_created_at")
                    .table(Message::Table)
                    .col(Message::ParentId)
                    .col(Message::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Message::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Message {
    Table,
    Id,
    ChannelId,
    UserId,
    ParentId,
    Body,
    CreatedAt,
    EditedAt,
    DeletedAt,
    DeletedBy,
}

#[derive(Iden)]
enum Channel {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

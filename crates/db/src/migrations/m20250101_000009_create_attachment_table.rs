//! Create attachment table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Attachment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Attachment::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Attachment::MessageId).string_len(36))
                    .col(ColumnDef::new(Attachment::UploaderId).string_len(36).not_null())
                    .col(ColumnDef::new(Attachment::ChannelId).string_len(36).not_null())
                    .col(ColumnDef::new(Attachment::FileName).string_len(256).not_null())
                    .col(ColumnDef::new(Attachment::MimeType).string_len(128).not_null())
                    .col(ColumnDef::new(Attachment::SizeBytes).big_integer().not_null())
                    .col(ColumnDef::new(Attachment::StorageKey).string_len(512).not_null())
                    .col(
                        ColumnDef::new(Attachment::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Attachment::UploadedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Attachment::ExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Attachment::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attachment_message")
                            .from(Attachment::Table, Attachment::MessageId)
                            .to(Message::Table, Message::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attachment_channel")
                            .from(Attachment::Table, Attachment::ChannelId)
                            .to(Channel::Table, Channel::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attachment_uploader")
                            .from(Attachment::Table, Attachment::UploaderId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_attachment_message_id")
                    .table(Attachment::Table)
                    .col(Attachment::MessageId)
                    .to_owned(),
            )
            .await?;

        // Index: (status, expires_at) - expired upload sweep
        manager
            .create_index(
                Index::create()
                    .name("idx_attachment_status_expires_at")
                    .table(Attachment::Table)
                    .col(Attachment::Status)
                    .col(Attachment::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Attachment::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Attachment {
    Table,
    Id,
    MessageId,
    UploaderId,
    ChannelId,
    FileName,
    MimeType,
    SizeBytes,
    StorageKey,
    Status,
    UploadedAt,
    ExpiresAt,
    CreatedAt,
}

#[derive(Iden)]
enum Message {
    Table,
    Id,
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

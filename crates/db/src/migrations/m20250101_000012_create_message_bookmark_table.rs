//! Create `message_bookmark` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MessageBookmark::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MessageBookmark::UserId).string_len(36).not_null())
                    .col(
                        ColumnDef::new(MessageBookmark::MessageId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MessageBookmark::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(MessageBookmark::UserId)
                            .col(MessageBookmark::MessageId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_bookmark_user")
                            .from(MessageBookmark::Table, MessageBookmark::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_bookmark_message")
                            .from(MessageBookmark::Table, MessageBookmark::MessageId)
                            .to(Message::Table, Message::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MessageBookmark::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MessageBookmark {
    Table,
    UserId,
    MessageId,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum Message {
    Table,
    Id,
}

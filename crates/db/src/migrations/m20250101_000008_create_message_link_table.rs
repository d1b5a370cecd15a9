//! Create `message_link` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MessageLink::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MessageLink::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MessageLink::MessageId).string_len(36).not_null())
                    .col(ColumnDef::new(MessageLink::Url).text().not_null())
                    .col(ColumnDef::new(MessageLink::Title).text())
                    .col(ColumnDef::new(MessageLink::Description).text())
                    .col(ColumnDef::new(MessageLink::ImageUrl).text())
                    .col(ColumnDef::new(MessageLink::SiteName).string_len(256))
                    .col(ColumnDef::new(MessageLink::CardType).string_len(64))
                    .col(
                        ColumnDef::new(MessageLink::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_link_message")
                            .from(MessageLink::Table, MessageLink::MessageId)
                            .to(Message::Table, Message::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_message_link_message_id")
                    .table(MessageLink::Table)
                    .col(MessageLink::MessageId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MessageLink::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MessageLink {
    Table,
    Id,
    MessageId,
    Url,
    Title,
    Description,
    ImageUrl,
    SiteName,
    CardType,
    CreatedAt,
}

#[derive(Iden)]
enum Message {
    Table,
    Id,
}

//! Create `message_user_mention` and `message_group_mention` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MessageUserMention::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MessageUserMention::MessageId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MessageUserMention::UserId)
                            .string_len(36)
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(MessageUserMention::MessageId)
                            .col(MessageUserMention::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_user_mention_message")
                            .from(MessageUserMention::Table, MessageUserMention::MessageId)
                            .to(Message::Table, Message::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_user_mention_user")
                            .from(MessageUserMention::Table, MessageUserMention::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: user_id (for has_mention lookups)
        manager
            .create_index(
                Index::create()
                    .name("idx_message_user_mention_user_id")
                    .table(MessageUserMention::Table)
                    .col(MessageUserMention::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MessageGroupMention::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MessageGroupMention::MessageId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MessageGroupMention::GroupId)
                            .string_len(36)
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(MessageGroupMention::MessageId)
                            .col(MessageGroupMention::GroupId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_group_mention_message")
                            .from(MessageGroupMention::Table, MessageGroupMention::MessageId)
                            .to(Message::Table, Message::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_message_group_mention_group")
                            .from(MessageGroupMention::Table, MessageGroupMention::GroupId)
                            .to(UserGroup::Table, UserGroup::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_message_group_mention_group_id")
                    .table(MessageGroupMention::Table)
                    .col(MessageGroupMention::GroupId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MessageGroupMention::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MessageUserMention::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MessageUserMention {
    Table,
    MessageId,
    UserId,
}

#[derive(Iden)]
enum MessageGroupMention {
    Table,
    MessageId,
    GroupId,
}

#[derive(Iden)]
enum Message {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum UserGroup {
    Table,
    Id,
}

//! Create `channel_read_state` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChannelReadState::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChannelReadState::ChannelId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ChannelReadState::UserId).string_len(36).not_null())
                    .col(
                        ColumnDef::new(ChannelReadState::LastReadAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(ChannelReadState::ChannelId)
                            .col(ChannelReadState::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_channel_read_state_channel")
                            .from(ChannelReadState::Table, ChannelReadState::ChannelId)
                            .to(Channel::Table, Channel::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_channel_read_state_user")
                            .from(ChannelReadState::Table, ChannelReadState::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (user_id, last_read_at) - unread channel listing
        manager
            .create_index(
                Index::create()
                    .name("idx_channel_read_state_user_last_read")
                    .table(ChannelReadState::Table)
                    .col(ChannelReadState::UserId)
                    .col(ChannelReadState::LastReadAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChannelReadState::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ChannelReadState {
    Table,
    ChannelId,
    UserId,
    LastReadAt,
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

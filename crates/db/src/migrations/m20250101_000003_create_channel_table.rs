//! Create channel and `channel_member` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Channel::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Channel::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Channel::WorkspaceId).string_len(36).not_null())
                    .col(ColumnDef::new(Channel::Name).string_len(128).not_null())
                    .col(ColumnDef::new(Channel::Description).text())
                    .col(
                        ColumnDef::new(Channel::IsPrivate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Channel::ChannelType)
                            .string_len(20)
                            .not_null()
                            .default("standard"),
                    )
                    .col(ColumnDef::new(Channel::CreatedBy).string_len(36).not_null())
                    .col(
                        ColumnDef::new(Channel::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Channel::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_channel_workspace")
                            .from(Channel::Table, Channel::WorkspaceId)
                            .to(Workspace::Table, Workspace::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_channel_workspace_id")
                    .table(Channel::Table)
                    .col(Channel::WorkspaceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ChannelMember::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ChannelMember::ChannelId).string_len(36).not_null())
                    .col(ColumnDef::new(ChannelMember::UserId).string_len(36).not_null())
                    .col(
                        ColumnDef::new(ChannelMember::Role)
                            .string_len(20)
                            .not_null()
                            .default("member"),
                    )
                    .col(
                        ColumnDef::new(ChannelMember::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(ChannelMember::ChannelId)
                            .col(ChannelMember::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_channel_member_channel")
                            .from(ChannelMember::Table, ChannelMember::ChannelId)
                            .to(Channel::Table, Channel::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_channel_member_user")
                            .from(ChannelMember::Table, ChannelMember::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: user_id (for accessible channel lookups)
        manager
            .create_index(
                Index::create()
                    .name("idx_channel_member_user_id")
                    .table(ChannelMember::Table)
                    .col(ChannelMember::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChannelMember::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Channel::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Channel {
    Table,
    Id,
    WorkspaceId,
    Name,
    Description,
    IsPrivate,
    ChannelType,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ChannelMember {
    Table,
    ChannelId,
    UserId,
    Role,
    JoinedAt,
}

#[derive(Iden)]
enum Workspace {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

//! Create `user_group` and `user_group_member` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserGroup::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserGroup::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserGroup::WorkspaceId).string_len(36).not_null())
                    .col(ColumnDef::new(UserGroup::Name).string_len(64).not_null())
                    .col(ColumnDef::new(UserGroup::CreatedBy).string_len(36).not_null())
                    .col(
                        ColumnDef::new(UserGroup::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_group_workspace")
                            .from(UserGroup::Table, UserGroup::WorkspaceId)
                            .to(Workspace::Table, Workspace::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (workspace_id, name) - group names address mentions
        manager
            .create_index(
                Index::create()
                    .name("idx_user_group_workspace_name")
                    .table(UserGroup::Table)
                    .col(UserGroup::WorkspaceId)
                    .col(UserGroup::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserGroupMember::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UserGroupMember::GroupId).string_len(36).not_null())
                    .col(ColumnDef::new(UserGroupMember::UserId).string_len(36).not_null())
                    .col(
                        ColumnDef::new(UserGroupMember::AddedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(UserGroupMember::GroupId)
                            .col(UserGroupMember::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_group_member_group")
                            .from(UserGroupMember::Table, UserGroupMember::GroupId)
                            .to(UserGroup::Table, UserGroup::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_group_member_user")
                            .from(UserGroupMember::Table, UserGroupMember::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_group_member_user_id")
                    .table(UserGroupMember::Table)
                    .col(UserGroupMember::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserGroupMember::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserGroup::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum UserGroup {
    Table,
    Id,
    WorkspaceId,
    Name,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum UserGroupMember {
    Table,
    GroupId,
    UserId,
    AddedAt,
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

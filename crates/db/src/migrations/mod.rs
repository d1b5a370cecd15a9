//! Database migrations.
//!
//! Forward-only, append-only schema migrations.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_user_table;
mod m20250101_000002_create_workspace_table;
mod m20250101_000003_create_channel_table;
mod m20250101_000004_create_user_group_table;
mod m20250101_000005_create_message_table;
mod m20250101_000006_create_message_reaction_table;
mod m20250101_000007_create_message_mention_tables;
mod m20250101_000008_create_message_link_table;
mod m20250101_000009_create_attachment_table;
mod m20250101_000010_create_channel_read_state_table;
mod m20250101_000011_create_message_pin_table;
mod m20250101_000012_create_message_bookmark_table;
mod m20250101_000013_create_system_message_table;
mod m20250101_000014_create_session_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_user_table::Migration),
            Box::new(m20250101_000002_create_workspace_table::Migration),
            Box::new(m20250101_000003_create_channel_table::Migration),
            Box::new(m20250101_000004_create_user_group_table::Migration),
            Box::new(m20250101_000005_create_message_table::Migration),
            Box::new(m20250101_000006_create_message_reaction_table::Migration),
            Box::new(m20250101_000007_create_message_mention_tables::Migration),
            Box::new(m20250101_000008_create_message_link_table::Migration),
            Box::new(m20250101_000009_create_attachment_table::Migration),
            Box::new(m20250101_000010_create_channel_read_state_table::Migration),
            Box::new(m20250101_000011_create_message_pin_table::Migration),
            Box::new(m20250101_000012_create_message_bookmark_table::Migration),
            Box::new(m20250101_000013_create_system_message_table::Migration),
            Box::new(m20250101_000014_create_session_table::Migration),
        ]
    }
}

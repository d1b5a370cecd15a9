//! Attachment entity.
//!
//! Lifecycle is one-way: `pending` (uploaded, unbound, expiring) →
//! `attached` (bound to a message) → `deleted`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Attachment lifecycle status.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum AttachmentStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "attached")]
    Attached,
    #[sea_orm(string_value = "deleted")]
    Deleted,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attachment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Set once the attachment is bound to a message
    #[sea_orm(nullable, indexed)]
    pub message_id: Option<String>,

    pub uploader_id: String,

    pub channel_id: String,

    pub file_name: String,

    pub mime_type: String,

    pub size_bytes: i64,

    /// Object storage key
    pub storage_key: String,

    pub status: AttachmentStatus,

    #[sea_orm(nullable)]
    pub uploaded_at: Option<DateTimeWithTimeZone>,

    /// Deadline for binding a pending upload
    #[sea_orm(nullable)]
    pub expires_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::message::Entity",
        from = "Column::MessageId",
        to = "super::message::Column::Id",
        on_delete = "Cascade"
    )]
    Message,
    #[sea_orm(
        belongs_to = "super::channel::Entity",
        from = "Column::ChannelId",
        to = "super::channel::Column::Id",
        on_delete = "Cascade"
    )]
    Channel,
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Message.def()
    }
}

impl Related<super::channel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Channel.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

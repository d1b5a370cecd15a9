//! Repositories.
//!
//! Each repository wraps the shared connection pool. Functions suffixed
//! `_in` take any [`sea_orm::ConnectionTrait`] so they can run inside a
//! [`crate::TransactionManager`] scope.

mod attachment;
mod bookmark;
mod channel;
mod link;
mod mention;
mod message;
mod pin;
mod reaction;
mod read_state;
mod system_message;
mod user;
mod user_group;
mod workspace;

pub use attachment::AttachmentRepository;
pub use bookmark::BookmarkRepository;
pub use channel::ChannelRepository;
pub use link::LinkRepository;
pub use mention::MentionRepository;
pub use message::{HistoryCursor, MessageRepository};
pub use pin::PinRepository;
pub use reaction::ReactionRepository;
pub use read_state::{ReadStateRepository, UnreadSummaryRow};
pub use system_message::SystemMessageRepository;
pub use user::UserRepository;
pub use user_group::UserGroupRepository;
pub use workspace::WorkspaceRepository;

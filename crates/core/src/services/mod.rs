//! Business logic services.

#![allow(missing_docs)]

pub mod access;
pub mod attachment;
pub mod bookmark;
pub mod dispatcher;
pub mod events;
pub mod identity;
pub mod link;
pub mod mention;
pub mod message;
pub mod pin;
pub mod reaction;
pub mod read_state;
pub mod system_message;
pub mod views;

#[cfg(test)]
pub(crate) mod fixture;

pub use access::AccessService;
pub use attachment::{AttachmentService, CreateUploadInput, UploadTicket};
pub use bookmark::BookmarkService;
pub use dispatcher::{EventDispatcher, Fanout, FanoutService, NoOpFanout};
pub use events::{ClientEvent, ServerEvent};
pub use identity::{Identity, IdentityProvider, JwtIdentityProvider};
pub use link::{LinkEnricher, extract_urls};
pub use mention::{MentionResolver, ResolvedMentions};
pub use message::{CreateMessageInput, EditMessageInput, ListMessagesQuery, MessageService};
pub use pin::PinService;
pub use reaction::ReactionService;
pub use read_state::{ChannelUnread, ReadMark, ReadStateService, UnreadStatus};
pub use system_message::SystemMessageService;
pub use views::{
    AttachmentView, BookmarkView, GroupSummary, LinkView, MessageView, MessageViewBuilder,
    PinView, ReactionSummary, SystemMessageView, UserSummary,
};

//! Database entities.

pub mod attachment;
pub mod channel;
pub mod channel_member;
pub mod channel_read_state;
pub mod message;
pub mod message_bookmark;
pub mod message_group_mention;
pub mod message_link;
pub mod message_pin;
pub mod message_reaction;
pub mod message_user_mention;
pub mod session;
pub mod system_message;
pub mod user;
pub mod user_group;
pub mod user_group_member;
pub mod workspace;
pub mod workspace_member;

pub use attachment::Entity as Attachment;
pub use channel::Entity as Channel;
pub use channel_member::Entity as ChannelMember;
pub use channel_read_state::Entity as ChannelReadState;
pub use message::Entity as Message;
pub use message_bookmark::Entity as MessageBookmark;
pub use message_group_mention::Entity as MessageGroupMention;
pub use message_link::Entity as MessageLink;
pub use message_pin::Entity as MessagePin;
pub use message_reaction::Entity as MessageReaction;
pub use message_user_mention::Entity as MessageUserMention;
pub use session::Entity as Session;
pub use system_message::Entity as SystemMessage;
pub use user::Entity as User;
pub use user_group::Entity as UserGroup;
pub use user_group_member::Entity as UserGroupMember;
pub use workspace::Entity as Workspace;
pub use workspace_member::Entity as WorkspaceMember;

//! # danmaku-core
//!
//! Domain layer for the live-room chat client: room identifiers, typed domain
//! events, and the collaborator traits the protocol client depends on.
//! This crate performs no I/O.

pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use error::{DomainError, DomainResult};
pub use events::{
    ChatEvent, DomainEvent, GiftEvent, GuardPurchaseEvent, NoticeEvent, SuperChatEvent,
    ViewerCountEvent, SYSTEM_USER_NAME,
};
pub use traits::{ChatSender, DanmuServerInfo, SessionIdentity, SessionProvider, TokenProvider};
pub use value_objects::{GuardLevel, RoomId, RoomIdParseError};

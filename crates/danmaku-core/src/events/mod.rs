//! Domain events emitted by the live-room chat stream

mod domain_event;

pub use domain_event::{
    ChatEvent, DomainEvent, GiftEvent, GuardPurchaseEvent, NoticeEvent, SuperChatEvent,
    ViewerCountEvent, SYSTEM_USER_NAME,
};

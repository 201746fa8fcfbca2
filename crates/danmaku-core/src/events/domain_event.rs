//! Domain events - typed messages parsed from a room's chat stream
//!
//! Events are immutable once constructed and are consumed by whatever renders
//! or logs the chat (UI overlay, terminal, recorder).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::GuardLevel;

/// Display name used for notices that do not originate from a viewer
pub const SYSTEM_USER_NAME: &str = "系统";

/// All possible domain events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    // =========================================================================
    // Viewer Messages
    // =========================================================================
    Chat(ChatEvent),
    Gift(GiftEvent),
    SuperChat(SuperChatEvent),
    GuardPurchase(GuardPurchaseEvent),

    // =========================================================================
    // Moderation Notices
    // =========================================================================
    Warning(NoticeEvent),
    StreamCut(NoticeEvent),

    // =========================================================================
    // Audience Counters
    // =========================================================================
    OnlineCount(ViewerCountEvent),
    WatchedCount(ViewerCountEvent),
}

impl DomainEvent {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chat(_) => "CHAT",
            Self::Gift(_) => "GIFT",
            Self::SuperChat(_) => "SUPER_CHAT",
            Self::GuardPurchase(_) => "GUARD_PURCHASE",
            Self::Warning(_) => "WARNING",
            Self::StreamCut(_) => "STREAM_CUT",
            Self::OnlineCount(_) => "ONLINE_COUNT",
            Self::WatchedCount(_) => "WATCHED_COUNT",
        }
    }

    /// Get the display name of the sender
    pub fn user_name(&self) -> &str {
        match self {
            Self::Chat(e) => &e.user_name,
            Self::Gift(e) => &e.user_name,
            Self::SuperChat(e) => &e.user_name,
            Self::GuardPurchase(e) => &e.user_name,
            Self::Warning(e) | Self::StreamCut(e) => &e.user_name,
            Self::OnlineCount(e) | Self::WatchedCount(e) => &e.user_name,
        }
    }

    /// Get the rendered content text
    pub fn content(&self) -> &str {
        match self {
            Self::Chat(e) => &e.content,
            Self::Gift(e) => &e.content,
            Self::SuperChat(e) => &e.content,
            Self::GuardPurchase(e) => &e.content,
            Self::Warning(e) | Self::StreamCut(e) => &e.content,
            Self::OnlineCount(e) | Self::WatchedCount(e) => &e.content,
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Chat(e) => e.timestamp,
            Self::Gift(e) => e.timestamp,
            Self::SuperChat(e) => e.timestamp,
            Self::GuardPurchase(e) => e.timestamp,
            Self::Warning(e) | Self::StreamCut(e) => e.timestamp,
            Self::OnlineCount(e) | Self::WatchedCount(e) => e.timestamp,
        }
    }

    /// Get the color hint, if the event carries one
    pub fn color(&self) -> Option<&str> {
        match self {
            Self::Chat(e) => e.color.as_deref(),
            Self::SuperChat(e) => e.color.as_deref(),
            Self::GuardPurchase(e) => Some(&e.color),
            Self::Warning(e) | Self::StreamCut(e) => Some(&e.color),
            Self::Gift(_) | Self::OnlineCount(_) | Self::WatchedCount(_) => None,
        }
    }

    /// Check if this is a paid event (gift, super chat, guard purchase)
    pub fn is_paid(&self) -> bool {
        matches!(
            self,
            Self::Gift(_) | Self::SuperChat(_) | Self::GuardPurchase(_)
        )
    }

    /// Check if this is a moderation notice
    pub fn is_notice(&self) -> bool {
        matches!(self, Self::Warning(_) | Self::StreamCut(_))
    }
}

// ============================================================================
// Event Structs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Sender name, decorated with medal and badges
    pub user_name: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GiftEvent {
    pub user_name: String,
    pub content: String,
    pub gift_name: String,
    pub count: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuperChatEvent {
    pub user_name: String,
    pub content: String,
    /// Price in CNY
    pub price: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardPurchaseEvent {
    pub user_name: String,
    pub content: String,
    pub guard_level: GuardLevel,
    pub months: u32,
    pub color: String,
    pub timestamp: DateTime<Utc>,
}

/// Payload shared by `WARNING` and `CUT_OFF` notices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeEvent {
    pub user_name: String,
    pub content: String,
    pub color: String,
    pub timestamp: DateTime<Utc>,
}

/// Payload shared by the online and watched counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerCountEvent {
    pub user_name: String,
    pub content: String,
    pub count: u64,
    pub timestamp: DateTime<Utc>,
}

//! Collaborator traits (ports) - define what the protocol client needs from
//! the outside world
//!
//! The client never talks HTTP or reads credentials itself. It asks a
//! [`TokenProvider`] for per-connection server info, a [`SessionProvider`]
//! for the viewer identity, and forwards outbound chat to a [`ChatSender`].

use async_trait::async_trait;

use crate::error::DomainResult;
use crate::value_objects::RoomId;

// ============================================================================
// Token Provider
// ============================================================================

/// Danmaku server info for one connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanmuServerInfo {
    /// Real room id (vanity ids are resolved by the provider)
    pub room_id: RoomId,
    /// Host name of the danmaku socket endpoint
    pub host: String,
    /// Port of the socket endpoint, if the provider reports one
    pub port: Option<u16>,
    /// Per-connection auth key
    pub token: String,
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Resolve the room and fetch a fresh connection token
    ///
    /// Called once per connection attempt.
    async fn danmu_info(&self, room_id: RoomId) -> DomainResult<DanmuServerInfo>;
}

// ============================================================================
// Session Provider
// ============================================================================

/// Viewer identity used by the auth packet and the chat sender
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Viewer uid, 0 when anonymous
    pub uid: u64,
    /// Browser id fragment (`buvid3`), empty when unknown
    pub buvid: String,
    /// CSRF token (`bili_jct`) needed for outbound chat
    pub csrf: Option<String>,
    /// Full `Cookie` header value for HTTP collaborators
    pub cookie_header: Option<String>,
}

impl SessionIdentity {
    /// Anonymous identity
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Check if the identity belongs to a logged-in viewer
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.uid != 0
    }
}

pub trait SessionProvider: Send + Sync {
    /// Get the current viewer identity
    fn identity(&self) -> SessionIdentity;
}

// ============================================================================
// Chat Sender
// ============================================================================

#[async_trait]
pub trait ChatSender: Send + Sync {
    /// Send a chat message to a room
    async fn send_chat(&self, room_id: RoomId, text: &str) -> DomainResult<()>;
}

//! Connection state and the current-room marker

use danmaku_core::RoomId;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Connection state
///
/// ```text
/// Disconnected -> Connecting -> Authenticated -> Disconnecting -> Disconnected
///                      ^              |
///                      |              v
///                      +-------- Reconnecting -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No socket and no subscription
    #[default]
    Disconnected,
    /// Fetching a token, opening the socket, or waiting for the auth reply
    Connecting,
    /// Auth accepted, heartbeat and receive loops running
    Authenticated,
    /// Waiting out a backoff delay after a failed connection
    Reconnecting,
    /// Tearing the connection down on request
    Disconnecting,
    /// Reconnect cap reached, waiting for a new explicit connect
    Failed,
}

impl ConnectionState {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Authenticated => "Authenticated",
            Self::Reconnecting => "Reconnecting",
            Self::Disconnecting => "Disconnecting",
            Self::Failed => "Failed",
        }
    }

    /// Check if the manager is working towards (or holding) a live socket
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Authenticated | Self::Reconnecting
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Room whose frames may be dispatched
///
/// Shared between the manager and the dispatcher; zero means none.
#[derive(Debug, Clone, Default)]
pub struct CurrentRoom(Arc<AtomicI64>);

impl CurrentRoom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> RoomId {
        RoomId::new(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, room_id: RoomId) {
        self.0.store(room_id.into_inner(), Ordering::Release);
    }

    /// Clear the marker only if it still names `room_id`
    pub fn clear_if(&self, room_id: RoomId) -> bool {
        self.0
            .compare_exchange(
                room_id.into_inner(),
                0,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn is_current(&self, room_id: RoomId) -> bool {
        !room_id.is_none() && self.get() == room_id
    }
}

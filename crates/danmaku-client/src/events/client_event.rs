use danmaku_core::{DomainEvent, RoomId};

use crate::connection::ConnectionState;

/// Item delivered on the manager's event channel
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A parsed chat-stream message
    Domain { room_id: RoomId, event: DomainEvent },
    /// Popularity count from a heartbeat reply
    Popularity { room_id: RoomId, count: u32 },
    /// Connection state transition
    StateChanged {
        room_id: RoomId,
        state: ConnectionState,
    },
}

impl ClientEvent {
    pub fn room_id(&self) -> RoomId {
        match self {
            Self::Domain { room_id, .. }
            | Self::Popularity { room_id, .. }
            | Self::StateChanged { room_id, .. } => *room_id,
        }
    }

    /// Get the domain event, if this is one
    pub fn as_domain(&self) -> Option<&DomainEvent> {
        match self {
            Self::Domain { event, .. } => Some(event),
            _ => None,
        }
    }
}

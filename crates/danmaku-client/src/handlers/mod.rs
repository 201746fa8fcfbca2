//! Frame handlers
//!
//! Routes inbound frames by operation code, and runs the per-connection
//! heartbeat and receive loops.

mod commands;
mod error;
mod heartbeat;
mod receive;

pub use commands::{extract_json, parse_command};
pub use error::{ClientError, ClientResult};
pub(crate) use heartbeat::{run_heartbeat, HeartbeatContext};
pub(crate) use receive::{run_receive, ReceiveContext};

use danmaku_core::{DomainEvent, RoomId};
use tokio::sync::mpsc;

use crate::connection::CurrentRoom;
use crate::events::ClientEvent;
use crate::protocol::{decompress, Frame, Operation, SubFrames};

/// Why a connection loop stopped
#[derive(Debug)]
pub(crate) enum LoopExit {
    /// The owner cancelled the loop
    Cancelled,
    /// The connection failed on its own
    Failed(ClientError),
}

/// Dispatch inbound frames to the event channel
///
/// Frames are only dispatched while their origin room is the current room.
#[derive(Debug, Clone)]
pub struct MessageDispatcher {
    events: mpsc::Sender<ClientEvent>,
    current_room: CurrentRoom,
}

impl MessageDispatcher {
    pub fn new(events: mpsc::Sender<ClientEvent>, current_room: CurrentRoom) -> Self {
        Self {
            events,
            current_room,
        }
    }

    /// Handle one binary socket message received for `origin`
    ///
    /// Returns the number of events emitted. Per-message errors are logged
    /// and never escape.
    pub async fn dispatch_frame(&self, origin: RoomId, data: &[u8]) -> usize {
        let frame = match Frame::decode(data) {
            Ok(frame) => frame,
            Err(e) => {
                let err = ClientError::from(e);
                tracing::warn!(room_id = %origin, error = %err, "Dropping frame");
                return 0;
            }
        };

        if !self.current_room.is_current(origin) {
            tracing::debug!(
                room_id = %origin,
                current = %self.current_room.get(),
                "Dropping frame from stale room"
            );
            return 0;
        }

        match frame.header.op() {
            Some(Operation::HeartbeatReply) => self.dispatch_popularity(origin, frame).await,
            Some(Operation::Notification) => self.dispatch_notification(origin, frame).await,
            Some(Operation::AuthReply) => {
                tracing::info!(
                    room_id = %origin,
                    body = %String::from_utf8_lossy(frame.body),
                    "Entered room"
                );
                0
            }
            _ => {
                tracing::debug!(
                    room_id = %origin,
                    operation = frame.header.operation,
                    "Ignoring frame"
                );
                0
            }
        }
    }

    async fn dispatch_popularity(&self, origin: RoomId, frame: Frame<'_>) -> usize {
        let Some(bytes) = frame.body.get(..4) else {
            tracing::debug!(room_id = %origin, len = frame.body.len(), "Short heartbeat reply");
            return 0;
        };

        let count = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        tracing::trace!(room_id = %origin, count, "Heartbeat reply");

        usize::from(
            self.emit(ClientEvent::Popularity {
                room_id: origin,
                count,
            })
            .await,
        )
    }

    async fn dispatch_notification(&self, origin: RoomId, frame: Frame<'_>) -> usize {
        let Some(version) = frame.header.protocol_version() else {
            tracing::warn!(
                room_id = %origin,
                version = frame.header.version,
                "Unsupported protocol version"
            );
            return 0;
        };

        let data = match decompress(version, frame.body) {
            Ok(data) => data,
            Err(source) => {
                let err = ClientError::DecompressionFailed { version, source };
                tracing::warn!(room_id = %origin, error = %err, "Dropping notification");
                return 0;
            }
        };

        if !version.is_compressed() {
            return self.dispatch_command(origin, &data).await;
        }

        let mut emitted = 0;
        for sub in SubFrames::new(&data) {
            emitted += self.dispatch_command(origin, sub.body).await;
        }
        emitted
    }

    async fn dispatch_command(&self, origin: RoomId, body: &[u8]) -> usize {
        match parse_command(body) {
            Ok(Some(event)) => usize::from(self.emit_domain(origin, event).await),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(room_id = %origin, error = %e, "Skipping notification");
                0
            }
        }
    }

    async fn emit_domain(&self, origin: RoomId, event: DomainEvent) -> bool {
        tracing::trace!(
            room_id = %origin,
            event_type = event.event_type(),
            "Dispatching event"
        );
        self.emit(ClientEvent::Domain {
            room_id: origin,
            event,
        })
        .await
    }

    /// Send an event unless its room stopped being current
    pub(crate) async fn emit(&self, event: ClientEvent) -> bool {
        let room_id = event.room_id();
        if !self.current_room.is_current(room_id) {
            tracing::debug!(room_id = %room_id, "Dropping event from stale room");
            return false;
        }

        if self.events.send(event).await.is_err() {
            tracing::debug!(room_id = %room_id, "Event receiver dropped");
            return false;
        }
        true
    }
}

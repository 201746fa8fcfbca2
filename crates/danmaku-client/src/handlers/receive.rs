//! Receive loop
//!
//! The only reader of the socket. Every inbound message refreshes liveness;
//! binary messages go to the dispatcher.

use danmaku_core::RoomId;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::{ClientError, LoopExit, MessageDispatcher};
use crate::connection::{Liveness, WsSource};

pub(crate) struct ReceiveContext {
    pub room_id: RoomId,
    pub dispatcher: MessageDispatcher,
    pub liveness: Arc<Liveness>,
    pub cancel: CancellationToken,
}

pub(crate) async fn run_receive(mut stream: WsSource, ctx: ReceiveContext) -> LoopExit {
    loop {
        let next = tokio::select! {
            () = ctx.cancel.cancelled() => return LoopExit::Cancelled,
            next = stream.next() => next,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                if ctx.cancel.is_cancelled() {
                    return LoopExit::Cancelled;
                }
                tracing::warn!(room_id = %ctx.room_id, error = %e, "WebSocket error");
                return LoopExit::Failed(e.into());
            }
            None => {
                if ctx.cancel.is_cancelled() {
                    return LoopExit::Cancelled;
                }
                tracing::warn!(room_id = %ctx.room_id, "WebSocket stream ended");
                return LoopExit::Failed(ClientError::TransportClosed);
            }
        };

        ctx.liveness.touch();

        match message {
            Message::Binary(data) => {
                tokio::select! {
                    () = ctx.cancel.cancelled() => return LoopExit::Cancelled,
                    _ = ctx.dispatcher.dispatch_frame(ctx.room_id, &data) => {}
                }
            }
            Message::Close(frame) => {
                if ctx.cancel.is_cancelled() {
                    return LoopExit::Cancelled;
                }
                tracing::info!(room_id = %ctx.room_id, frame = ?frame, "Server closed connection");
                return LoopExit::Failed(ClientError::TransportClosed);
            }
            Message::Text(text) => {
                tracing::debug!(room_id = %ctx.room_id, len = text.len(), "Ignoring text message");
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                tracing::trace!(room_id = %ctx.room_id, "Control frame received");
            }
        }
    }
}

//! Heartbeat loop (op 2)
//!
//! Sends an empty heartbeat frame every interval. It never reads from the
//! socket; a connection is considered dead when the receive loop has seen no
//! frame for longer than the liveness timeout.

use danmaku_core::RoomId;
use futures_util::SinkExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::{ClientError, LoopExit};
use crate::config::MIN_PERIOD;
use crate::connection::{Liveness, SharedSink};
use crate::protocol::Frame;

pub(crate) struct HeartbeatContext {
    pub room_id: RoomId,
    pub sink: SharedSink,
    pub liveness: Arc<Liveness>,
    pub interval: Duration,
    pub liveness_timeout: Duration,
    pub cancel: CancellationToken,
}

pub(crate) async fn run_heartbeat(ctx: HeartbeatContext) -> LoopExit {
    // `interval` panics on a zero period
    let mut ticker = interval(ctx.interval.max(MIN_PERIOD));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = ctx.cancel.cancelled() => return LoopExit::Cancelled,
            _ = ticker.tick() => {}
        }

        let silent = ctx.liveness.elapsed();
        if silent > ctx.liveness_timeout {
            tracing::warn!(
                room_id = %ctx.room_id,
                silent_ms = silent.as_millis(),
                "Connection timed out (no frames)"
            );
            return LoopExit::Failed(ClientError::LivenessTimeout(silent));
        }

        let send = async {
            let mut sink = ctx.sink.lock().await;
            sink.send(Message::Binary(Frame::heartbeat())).await
        };

        let result = tokio::select! {
            () = ctx.cancel.cancelled() => return LoopExit::Cancelled,
            result = send => result,
        };

        if let Err(e) = result {
            if ctx.cancel.is_cancelled() {
                return LoopExit::Cancelled;
            }
            tracing::warn!(room_id = %ctx.room_id, error = %e, "Failed to send heartbeat");
            return LoopExit::Failed(e.into());
        }

        tracing::trace!(room_id = %ctx.room_id, "Heartbeat sent");
    }
}

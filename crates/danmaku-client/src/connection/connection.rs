//! One established room connection
//!
//! Owns the socket halves, the two loop tasks, and their cancellation
//! signals. Dropped only through [`RoomConnection::shutdown`].

use danmaku_core::RoomId;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::SinkExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;
pub(crate) type WsSource = SplitStream<WsStream>;

/// Write half shared by the heartbeat loop and teardown
pub(crate) type SharedSink = Arc<tokio::sync::Mutex<WsSink>>;

/// Time of the last inbound frame of any kind
#[derive(Debug)]
pub(crate) struct Liveness {
    last_frame: Mutex<Instant>,
}

impl Liveness {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            last_frame: Mutex::new(Instant::now()),
        })
    }

    pub(crate) fn touch(&self) {
        *self.last_frame.lock() = Instant::now();
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.last_frame.lock().elapsed()
    }
}

/// An authenticated connection and its loops
pub(crate) struct RoomConnection {
    /// Unique id for log correlation
    id: String,
    room_id: RoomId,
    generation: u64,
    sink: SharedSink,
    heartbeat_cancel: CancellationToken,
    receive_cancel: CancellationToken,
    heartbeat_task: JoinHandle<()>,
    receive_task: JoinHandle<()>,
    created_at: Instant,
}

impl RoomConnection {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: String,
        room_id: RoomId,
        generation: u64,
        sink: SharedSink,
        heartbeat_cancel: CancellationToken,
        receive_cancel: CancellationToken,
        heartbeat_task: JoinHandle<()>,
        receive_task: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            room_id,
            generation,
            sink,
            heartbeat_cancel,
            receive_cancel,
            heartbeat_task,
            receive_task,
            created_at: Instant::now(),
        }
    }

    pub(crate) fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Stop both loops without waiting for them
    pub(crate) fn cancel(&self) {
        self.heartbeat_cancel.cancel();
        self.receive_cancel.cancel();
    }

    /// Cancel both loops, close the socket, and wait for the loops to end
    ///
    /// Close errors and close timeouts are logged and otherwise ignored.
    pub(crate) async fn shutdown(self, close_timeout: Duration) {
        tracing::debug!(
            connection_id = %self.id,
            room_id = %self.room_id,
            generation = self.generation,
            uptime_ms = self.created_at.elapsed().as_millis(),
            "Shutting down connection"
        );

        self.cancel();

        let sink = Arc::clone(&self.sink);
        let close = async move {
            let mut sink = sink.lock().await;
            sink.close().await
        };
        match tokio::time::timeout(close_timeout, close).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(connection_id = %self.id, error = %e, "Close frame failed");
            }
            Err(_) => {
                tracing::debug!(connection_id = %self.id, "Close frame timed out");
            }
        }

        for (name, task) in [
            ("heartbeat", self.heartbeat_task),
            ("receive", self.receive_task),
        ] {
            if let Err(e) = task.await {
                tracing::warn!(connection_id = %self.id, task = name, error = %e, "Loop task failed");
            }
        }

        tracing::info!(room_id = %self.room_id, "Connection closed");
    }
}

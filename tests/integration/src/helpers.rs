//! Test helpers for integration tests
//!
//! Provides an in-process danmaku socket server speaking the framing
//! protocol, a scripted token provider, and event-stream assertions.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use danmaku_client::protocol::{Frame, Operation, ProtocolVersion};
use danmaku_client::{BackoffPolicy, ClientConfig, ClientEvent, ConnectionState};
use danmaku_core::{
    DanmuServerInfo, DomainError, DomainEvent, DomainResult, RoomId, TokenProvider,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Upper bound for any single wait in a test
pub const WAIT: Duration = Duration::from_secs(5);

/// Popularity count sent in every heartbeat reply
pub const POPULARITY: u32 = 1234;

pub const TEST_TOKEN: &str = "test-token";

/// Client tuning for tests: plain `ws://`, short backoff
pub fn test_config() -> ClientConfig {
    ClientConfig {
        use_tls: false,
        heartbeat_interval: Duration::from_millis(200),
        liveness_timeout: Duration::from_secs(5),
        backoff: BackoffPolicy::from_millis(&[10, 20, 30], 5),
        close_timeout: Duration::from_millis(200),
        connect_timeout: Duration::from_secs(2),
        event_buffer: 256,
    }
}

// ============================================================================
// Mock danmaku server
// ============================================================================

/// How the mock server treats its clients
#[derive(Debug, Clone, Copy)]
pub struct ServerBehavior {
    /// Answer the auth packet with a close frame
    pub reject_auth: bool,
    /// Answer heartbeats with a popularity count
    pub reply_heartbeats: bool,
}

impl Default for ServerBehavior {
    fn default() -> Self {
        Self {
            reject_auth: false,
            reply_heartbeats: true,
        }
    }
}

enum Command {
    Send(Vec<u8>),
    Close,
    Drop,
}

/// Server side of one authenticated client socket
pub struct ServerConnection {
    /// Decoded auth packet body
    pub auth: Value,
    commands: mpsc::UnboundedSender<Command>,
    heartbeats: Arc<AtomicUsize>,
    closed: CancellationToken,
}

impl ServerConnection {
    /// Send a raw binary message to the client
    pub fn send(&self, data: Vec<u8>) {
        let _ = self.commands.send(Command::Send(data));
    }

    /// Send a close frame and end the connection
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    /// End the connection without a close frame
    pub fn drop_connection(&self) {
        let _ = self.commands.send(Command::Drop);
    }

    pub fn heartbeats(&self) -> usize {
        self.heartbeats.load(Ordering::SeqCst)
    }

    /// Wait until the socket is gone
    pub async fn closed(&self) {
        tokio::time::timeout(WAIT, self.closed.cancelled())
            .await
            .expect("connection was not closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// In-process danmaku socket server on 127.0.0.1
pub struct MockDanmakuServer {
    addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<ServerConnection>,
    _handle: JoinHandle<()>,
}

impl MockDanmakuServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(ServerBehavior::default()).await
    }

    pub async fn start_with(behavior: ServerBehavior) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, connections) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, behavior, tx.clone()));
            }
        });

        Ok(Self {
            addr,
            connections,
            _handle: handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the next client that sent an auth packet
    pub async fn next_connection(&mut self) -> ServerConnection {
        tokio::time::timeout(WAIT, self.connections.recv())
            .await
            .expect("no client connected")
            .expect("server stopped")
    }

    /// Check that no client authenticates within `window`
    pub async fn assert_no_connection(&mut self, window: Duration) {
        if let Ok(Some(conn)) = tokio::time::timeout(window, self.connections.recv()).await {
            panic!("unexpected connection with auth {}", conn.auth);
        }
    }
}

async fn serve(
    stream: TcpStream,
    behavior: ServerBehavior,
    tx: mpsc::UnboundedSender<ServerConnection>,
) {
    let Ok(socket) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = socket.split();

    let auth = match source.next().await {
        Some(Ok(Message::Binary(data))) => decode_auth(&data),
        _ => return,
    };

    let (commands, mut command_rx) = mpsc::unbounded_channel();
    let heartbeats = Arc::new(AtomicUsize::new(0));
    let closed = CancellationToken::new();
    let _ = tx.send(ServerConnection {
        auth,
        commands,
        heartbeats: Arc::clone(&heartbeats),
        closed: closed.clone(),
    });

    if behavior.reject_auth {
        let _ = sink.send(Message::Close(None)).await;
        closed.cancel();
        return;
    }

    let reply = Frame::encode(Operation::AuthReply, ProtocolVersion::Plain, br#"{"code":0}"#);
    if sink.send(Message::Binary(reply)).await.is_err() {
        closed.cancel();
        return;
    }

    let mut commands_open = true;
    loop {
        tokio::select! {
            command = command_rx.recv(), if commands_open => match command {
                Some(Command::Send(data)) => {
                    if sink.send(Message::Binary(data)).await.is_err() {
                        break;
                    }
                }
                Some(Command::Close) => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                Some(Command::Drop) => break,
                None => commands_open = false,
            },
            message = source.next() => match message {
                Some(Ok(Message::Binary(data))) => {
                    let is_heartbeat = Frame::decode(&data)
                        .is_ok_and(|frame| frame.header.op() == Some(Operation::Heartbeat));
                    if is_heartbeat {
                        heartbeats.fetch_add(1, Ordering::SeqCst);
                        if behavior.reply_heartbeats {
                            let reply = Frame::encode(
                                Operation::HeartbeatReply,
                                ProtocolVersion::Plain,
                                &POPULARITY.to_be_bytes(),
                            );
                            if sink.send(Message::Binary(reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    closed.cancel();
}

fn decode_auth(data: &[u8]) -> Value {
    let frame = Frame::decode(data).expect("auth frame");
    assert_eq!(frame.header.op(), Some(Operation::Auth));
    serde_json::from_slice(frame.body).expect("auth body")
}

// ============================================================================
// Token provider
// ============================================================================

/// What `MockTokens` does once its successful calls are used up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exhausted {
    Fail,
    Hang,
}

/// Token provider pointing at a mock server
///
/// Succeeds for the first `succeed` calls (all calls when `None`), then
/// either fails or never answers.
pub struct MockTokens {
    addr: SocketAddr,
    succeed: Option<usize>,
    exhausted: Exhausted,
    calls: AtomicUsize,
}

impl MockTokens {
    pub fn new(addr: SocketAddr) -> Arc<Self> {
        Self::build(addr, None, Exhausted::Fail)
    }

    pub fn failing_after(addr: SocketAddr, succeed: usize) -> Arc<Self> {
        Self::build(addr, Some(succeed), Exhausted::Fail)
    }

    /// Later calls stay pending forever
    pub fn hanging_after(addr: SocketAddr, succeed: usize) -> Arc<Self> {
        Self::build(addr, Some(succeed), Exhausted::Hang)
    }

    fn build(addr: SocketAddr, succeed: Option<usize>, exhausted: Exhausted) -> Arc<Self> {
        Arc::new(Self {
            addr,
            succeed,
            exhausted,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for MockTokens {
    async fn danmu_info(&self, room_id: RoomId) -> DomainResult<DanmuServerInfo> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.succeed.is_some_and(|limit| call > limit) {
            if self.exhausted == Exhausted::Hang {
                std::future::pending::<()>().await;
            }
            return Err(DomainError::token_fetch(room_id, "token service unavailable"));
        }
        Ok(DanmuServerInfo {
            room_id,
            host: self.addr.ip().to_string(),
            port: Some(self.addr.port()),
            token: TEST_TOKEN.to_string(),
        })
    }
}

// ============================================================================
// Event assertions
// ============================================================================

pub async fn next_event(events: &mut mpsc::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Next domain event, skipping popularity and state events
pub async fn next_domain(events: &mut mpsc::Receiver<ClientEvent>) -> (RoomId, DomainEvent) {
    loop {
        if let ClientEvent::Domain { room_id, event } = next_event(events).await {
            return (room_id, event);
        }
    }
}

/// Skip events until the manager reports `state`
pub async fn wait_for_state(events: &mut mpsc::Receiver<ClientEvent>, state: ConnectionState) {
    loop {
        if let ClientEvent::StateChanged { state: s, .. } = next_event(events).await {
            if s == state {
                return;
            }
        }
    }
}

/// Drain whatever is queued without waiting
pub fn drain(events: &mut mpsc::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

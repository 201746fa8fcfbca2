//! Connection manager
//!
//! Owns at most one room connection. Explicit connects and background
//! reconnects are serialized by the connect lock; teardown goes through the
//! connection slot, which disconnect can reach without waiting for an
//! in-flight connect. A pending connect or reconnect is abandoned as soon as
//! its subscription is cancelled.

use danmaku_common::CookieSession;
use danmaku_core::{
    ChatEvent, ChatSender, DomainError, DomainEvent, RoomId, SessionProvider, TokenProvider,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::{ConnectionState, CurrentRoom, Liveness, RoomConnection};
use crate::config::ClientConfig;
use crate::events::ClientEvent;
use crate::handlers::{
    run_heartbeat, run_receive, ClientError, ClientResult, HeartbeatContext, LoopExit,
    MessageDispatcher, ReceiveContext,
};
use crate::protocol::AuthPacket;

/// Display name for locally echoed chat
const LOCAL_ECHO_NAME: &str = "我";

/// The room the caller asked for, and the signal that abandons work for it
struct Subscription {
    id: u64,
    room_id: RoomId,
    cancel: CancellationToken,
}

struct Inner {
    config: ClientConfig,
    tokens: Arc<dyn TokenProvider>,
    session: Arc<dyn SessionProvider>,
    chat: Option<Arc<dyn ChatSender>>,
    dispatcher: MessageDispatcher,
    current_room: CurrentRoom,
    events: mpsc::Sender<ClientEvent>,

    /// Serializes connect and reconnect
    connect_lock: tokio::sync::Mutex<()>,
    /// The live connection, if any
    slot: tokio::sync::Mutex<Option<RoomConnection>>,

    subscription: Mutex<Option<Subscription>>,
    next_subscription: AtomicU64,
    state: RwLock<ConnectionState>,
    /// Bumped for every stored connection
    generation: AtomicU64,
    /// Highest generation that already requested a reconnect
    reconnect_generation: AtomicU64,
    /// Reconnect attempts since the last successful connect
    attempts: AtomicU32,
}

/// Builder for [`ConnectionManager`]
pub struct ConnectionManagerBuilder {
    config: ClientConfig,
    tokens: Arc<dyn TokenProvider>,
    session: Option<Arc<dyn SessionProvider>>,
    chat: Option<Arc<dyn ChatSender>>,
}

impl ConnectionManagerBuilder {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            config: ClientConfig::default(),
            tokens,
            session: None,
            chat: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Viewer identity for the auth packet (anonymous when unset)
    #[must_use]
    pub fn session(mut self, session: Arc<dyn SessionProvider>) -> Self {
        self.session = Some(session);
        self
    }

    /// Outbound chat collaborator; without one `send_chat` fails
    #[must_use]
    pub fn chat_sender(mut self, chat: Arc<dyn ChatSender>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Build the manager and the receiving end of its event channel
    pub fn build(self) -> (ConnectionManager, mpsc::Receiver<ClientEvent>) {
        let (events, receiver) = mpsc::channel(self.config.event_buffer.max(1));
        let current_room = CurrentRoom::new();
        let dispatcher = MessageDispatcher::new(events.clone(), current_room.clone());
        let session = self
            .session
            .unwrap_or_else(|| Arc::new(CookieSession::anonymous()));

        let inner = Inner {
            config: self.config,
            tokens: self.tokens,
            session,
            chat: self.chat,
            dispatcher,
            current_room,
            events,
            connect_lock: tokio::sync::Mutex::new(()),
            slot: tokio::sync::Mutex::new(None),
            subscription: Mutex::new(None),
            next_subscription: AtomicU64::new(1),
            state: RwLock::new(ConnectionState::Disconnected),
            generation: AtomicU64::new(0),
            reconnect_generation: AtomicU64::new(0),
            attempts: AtomicU32::new(0),
        };

        (
            ConnectionManager {
                inner: Arc::new(inner),
            },
            receiver,
        )
    }
}

/// Reconnecting single-room connection manager
///
/// Cheap to clone; all clones drive the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn builder(tokens: Arc<dyn TokenProvider>) -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new(tokens)
    }

    /// Connect to a room, replacing any existing connection
    ///
    /// Returns once the server accepted the auth packet. Failures are
    /// returned to the caller and are not retried; a later connection loss
    /// is healed in the background.
    pub async fn connect(&self, room_id: RoomId) -> ClientResult<()> {
        if room_id.is_none() {
            return Err(DomainError::InvalidRoomId(room_id.to_string()).into());
        }

        let (subscription_id, cancel) = self.inner.subscribe(room_id);
        tracing::info!(room_id = %room_id, "Connecting");

        let _guard = tokio::select! {
            () = cancel.cancelled() => return Err(ClientError::Cancelled),
            guard = self.inner.connect_lock.lock() => guard,
        };
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        self.inner.attempts.store(0, Ordering::Release);
        match self.inner.establish(room_id, &cancel).await {
            Ok(()) => Ok(()),
            Err(ClientError::Cancelled) => Err(ClientError::Cancelled),
            Err(e) => {
                tracing::error!(room_id = %room_id, error = %e, code = e.code(), "Connect failed");
                self.inner.unsubscribe(subscription_id);
                let state = if e.is_operator_visible() {
                    ConnectionState::Failed
                } else {
                    ConnectionState::Disconnected
                };
                self.inner.set_state_unless(room_id, state, &cancel);
                Err(e)
            }
        }
    }

    /// Disconnect from a room
    ///
    /// Abandons any pending connect or reconnect for the room, then closes
    /// its connection. A room that is neither subscribed nor connected is a
    /// no-op.
    pub async fn disconnect(&self, room_id: RoomId) {
        let cancelled = self.inner.cancel_subscription(room_id);

        let mut slot = self.inner.slot.lock().await;
        let connection = if slot.as_ref().is_some_and(|conn| conn.room_id() == room_id) {
            slot.take()
        } else {
            None
        };
        drop(slot);

        if !cancelled && connection.is_none() {
            tracing::debug!(room_id = %room_id, "Disconnect for inactive room");
            return;
        }

        tracing::info!(room_id = %room_id, "Disconnecting");
        self.inner.set_state(room_id, ConnectionState::Disconnecting);
        if let Some(conn) = connection {
            conn.shutdown(self.inner.config.close_timeout).await;
        }
        self.inner.current_room.clear_if(room_id);
        self.inner.set_state(room_id, ConnectionState::Disconnected);
    }

    /// Send a chat message to a room through the chat collaborator
    ///
    /// On success the message is echoed locally as a chat event.
    pub async fn send_chat(&self, room_id: RoomId, text: &str) -> ClientResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::EmptyMessage.into());
        }
        let Some(chat) = &self.inner.chat else {
            return Err(DomainError::ChatSend("no chat sender configured".to_string()).into());
        };

        chat.send_chat(room_id, text).await?;
        tracing::debug!(room_id = %room_id, "Chat message sent");

        let echo = DomainEvent::Chat(ChatEvent {
            user_name: LOCAL_ECHO_NAME.to_string(),
            content: text.to_string(),
            color: None,
            timestamp: chrono::Utc::now(),
        });
        self.inner
            .dispatcher
            .emit(ClientEvent::Domain {
                room_id,
                event: echo,
            })
            .await;
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    /// Room whose events are currently dispatched
    pub fn current_room(&self) -> Option<RoomId> {
        let room_id = self.inner.current_room.get();
        (!room_id.is_none()).then_some(room_id)
    }
}

impl Inner {
    /// Install a new subscription, abandoning the previous one
    fn subscribe(&self, room_id: RoomId) -> (u64, CancellationToken) {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let previous = self.subscription.lock().replace(Subscription {
            id,
            room_id,
            cancel: cancel.clone(),
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
        (id, cancel)
    }

    fn unsubscribe(&self, id: u64) {
        let mut subscription = self.subscription.lock();
        if subscription.as_ref().is_some_and(|s| s.id == id) {
            *subscription = None;
        }
    }

    /// Cancel the subscription for `room_id`; returns whether one existed
    fn cancel_subscription(&self, room_id: RoomId) -> bool {
        let mut subscription = self.subscription.lock();
        match subscription.take() {
            Some(s) if s.room_id == room_id => {
                s.cancel.cancel();
                true
            }
            other => {
                *subscription = other;
                false
            }
        }
    }

    /// Live subscription for `room_id`
    fn subscription_for(&self, room_id: RoomId) -> Option<(u64, CancellationToken)> {
        self.subscription
            .lock()
            .as_ref()
            .filter(|s| s.room_id == room_id && !s.cancel.is_cancelled())
            .map(|s| (s.id, s.cancel.clone()))
    }

    fn set_state(&self, room_id: RoomId, state: ConnectionState) {
        self.transition(room_id, state, None);
    }

    /// Set the state unless `cancel` has fired; returns whether it was set
    ///
    /// Checked under the state lock. `disconnect` cancels before it
    /// publishes, so a cancelled attempt cannot overwrite `Disconnected`.
    fn set_state_unless(
        &self,
        room_id: RoomId,
        state: ConnectionState,
        cancel: &CancellationToken,
    ) -> bool {
        self.transition(room_id, state, Some(cancel))
    }

    fn transition(
        &self,
        room_id: RoomId,
        state: ConnectionState,
        cancel: Option<&CancellationToken>,
    ) -> bool {
        let mut current = self.state.write();
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return false;
        }
        let previous = std::mem::replace(&mut *current, state);
        if previous == state {
            return true;
        }
        tracing::debug!(room_id = %room_id, from = %previous, to = %state, "State changed");

        if let Err(e) = self.events.try_send(ClientEvent::StateChanged { room_id, state }) {
            tracing::debug!(room_id = %room_id, error = %e, "State event not delivered");
        }
        true
    }

    /// Close the stored connection, whatever room it belongs to
    async fn teardown_current(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(conn) = slot.take() {
            let room_id = conn.room_id();
            self.current_room.clear_if(room_id);
            conn.shutdown(self.config.close_timeout).await;
        }
    }

    /// One connection attempt: token, socket, auth, loops
    ///
    /// Must be called with the connect lock held.
    async fn establish(
        self: &Arc<Self>,
        room_id: RoomId,
        cancel: &CancellationToken,
    ) -> ClientResult<()> {
        if !self.set_state_unless(room_id, ConnectionState::Connecting, cancel) {
            return Err(ClientError::Cancelled);
        }
        self.teardown_current().await;

        let handshake = async {
            let info = self
                .tokens
                .danmu_info(room_id)
                .await
                .map_err(ClientError::TokenFetchFailed)?;
            let url = self.config.endpoint(&info);
            tracing::debug!(room_id = %room_id, real_room_id = %info.room_id, url = %url, "Opening socket");

            let (socket, _) = tokio::time::timeout(
                self.config.connect_timeout,
                tokio_tungstenite::connect_async(url),
            )
            .await
            .map_err(|_| ClientError::Timeout("socket open"))??;
            let (mut sink, mut stream) = socket.split();

            let identity = self.session.identity();
            let packet = AuthPacket::new(info.room_id, info.token, &identity).to_frame()?;
            sink.send(Message::Binary(packet)).await?;

            let reply = match stream.next().await {
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map_or_else(
                        || "closed without reason".to_string(),
                        |f| format!("closed with {}: {}", u16::from(f.code), f.reason),
                    );
                    return Err(ClientError::AuthenticationFailed { room_id, reason });
                }
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(ClientError::AuthenticationFailed {
                        room_id,
                        reason: "stream ended before auth reply".to_string(),
                    })
                }
            };
            Ok::<_, ClientError>((sink, stream, reply))
        };

        let (sink, stream, reply) = tokio::select! {
            () = cancel.cancelled() => return Err(ClientError::Cancelled),
            result = handshake => result?,
        };

        let sink = Arc::new(tokio::sync::Mutex::new(sink));
        let liveness = Liveness::new();

        let mut slot = self.slot.lock().await;
        if cancel.is_cancelled() {
            drop(slot);
            let close = async { sink.lock().await.close().await };
            match tokio::time::timeout(self.config.close_timeout, close).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(room_id = %room_id, error = %e, "Close after cancel failed");
                }
                Err(_) => tracing::debug!(room_id = %room_id, "Close after cancel timed out"),
            }
            return Err(ClientError::Cancelled);
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.current_room.set(room_id);
        self.attempts.store(0, Ordering::Release);
        self.set_state(room_id, ConnectionState::Authenticated);

        let heartbeat_cancel = CancellationToken::new();
        let receive_cancel = CancellationToken::new();
        let heartbeat_task = spawn_loop(
            Arc::downgrade(self),
            room_id,
            generation,
            run_heartbeat(HeartbeatContext {
                room_id,
                sink: Arc::clone(&sink),
                liveness: Arc::clone(&liveness),
                interval: self.config.heartbeat_interval,
                liveness_timeout: self.config.liveness_timeout,
                cancel: heartbeat_cancel.clone(),
            }),
        );
        let receive_task = spawn_loop(
            Arc::downgrade(self),
            room_id,
            generation,
            run_receive(
                stream,
                ReceiveContext {
                    room_id,
                    dispatcher: self.dispatcher.clone(),
                    liveness,
                    cancel: receive_cancel.clone(),
                },
            ),
        );

        *slot = Some(RoomConnection::new(
            uuid::Uuid::new_v4().to_string(),
            room_id,
            generation,
            sink,
            heartbeat_cancel,
            receive_cancel,
            heartbeat_task,
            receive_task,
        ));
        drop(slot);
        tracing::info!(room_id = %room_id, generation, "Connected");

        if let Message::Binary(data) = reply {
            self.dispatcher.dispatch_frame(room_id, &data).await;
        }
        Ok(())
    }

    /// Start a background reconnect for a failed connection
    ///
    /// Only the first failure of the newest generation counts, and only while
    /// the room is still subscribed.
    fn request_reconnect(self: Arc<Self>, room_id: RoomId, generation: u64, cause: ClientError) {
        if generation != self.generation.load(Ordering::Acquire) {
            tracing::debug!(room_id = %room_id, generation, "Ignoring failure of superseded connection");
            return;
        }
        if self.reconnect_generation.fetch_max(generation, Ordering::AcqRel) >= generation {
            return;
        }
        if self.subscription_for(room_id).is_none() {
            tracing::debug!(room_id = %room_id, "Connection lost after unsubscribe");
            return;
        }

        tracing::warn!(room_id = %room_id, error = %cause, code = cause.code(), "Connection lost");
        tokio::spawn(self.reconnect(room_id));
    }

    async fn reconnect(self: Arc<Self>, room_id: RoomId) {
        let Some((subscription_id, cancel)) = self.subscription_for(room_id) else {
            return;
        };

        let _guard = tokio::select! {
            () = cancel.cancelled() => return,
            guard = self.connect_lock.lock() => guard,
        };
        if !self.set_state_unless(room_id, ConnectionState::Reconnecting, &cancel) {
            return;
        }
        self.teardown_current().await;

        let backoff = &self.config.backoff;
        loop {
            let attempts = self.attempts.load(Ordering::Acquire);
            if !backoff.allows(attempts) {
                let err = ClientError::ReconnectExhausted { room_id, attempts };
                tracing::error!(room_id = %room_id, error = %err, code = err.code(), "Giving up");
                self.unsubscribe(subscription_id);
                self.set_state_unless(room_id, ConnectionState::Failed, &cancel);
                return;
            }

            let attempt = self.attempts.fetch_add(1, Ordering::AcqRel) + 1;
            let delay = backoff.delay_for(attempt);
            tracing::info!(
                room_id = %room_id,
                attempt,
                max_attempts = backoff.max_attempts(),
                delay_ms = delay.as_millis(),
                "Reconnecting"
            );

            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }

            match self.establish(room_id, &cancel).await {
                Ok(()) => {
                    tracing::info!(room_id = %room_id, attempt, "Reconnected");
                    return;
                }
                Err(ClientError::Cancelled) => return,
                Err(e) if e.is_operator_visible() => {
                    tracing::error!(room_id = %room_id, error = %e, code = e.code(), "Reconnect rejected");
                    self.unsubscribe(subscription_id);
                    self.set_state_unless(room_id, ConnectionState::Failed, &cancel);
                    return;
                }
                Err(e) => {
                    tracing::warn!(room_id = %room_id, attempt, error = %e, "Reconnect attempt failed");
                    if !self.set_state_unless(room_id, ConnectionState::Reconnecting, &cancel) {
                        return;
                    }
                }
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.get_mut().take() {
            subscription.cancel.cancel();
        }
        if let Some(conn) = self.slot.get_mut().take() {
            conn.cancel();
        }
    }
}

/// Run a connection loop and turn its failure into a reconnect request
fn spawn_loop<F>(inner: Weak<Inner>, room_id: RoomId, generation: u64, run: F) -> JoinHandle<()>
where
    F: Future<Output = LoopExit> + Send + 'static,
{
    tokio::spawn(async move {
        if let LoopExit::Failed(cause) = run.await {
            if let Some(inner) = inner.upgrade() {
                inner.request_reconnect(room_id, generation, cause);
            }
        }
    })
}

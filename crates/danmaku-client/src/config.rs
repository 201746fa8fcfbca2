//! Client tuning

use danmaku_common::ClientSettings;
use danmaku_core::DanmuServerInfo;
use std::time::Duration;

use crate::connection::BackoffPolicy;

/// Socket path on the danmaku host
const SOCKET_PATH: &str = "/sub";

/// Floor for the heartbeat period and the socket/liveness timeouts
pub(crate) const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Settings consumed by the connection manager
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `wss://` when true, `ws://` otherwise
    pub use_tls: bool,
    pub heartbeat_interval: Duration,
    /// Silence after which the connection is treated as dead
    pub liveness_timeout: Duration,
    pub backoff: BackoffPolicy,
    /// How long to wait for the close handshake on teardown
    pub close_timeout: Duration,
    pub connect_timeout: Duration,
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from(&ClientSettings::default())
    }
}

impl From<&ClientSettings> for ClientConfig {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            use_tls: settings.use_tls,
            heartbeat_interval: Duration::from_secs(settings.heartbeat_interval_secs)
                .max(MIN_PERIOD),
            liveness_timeout: Duration::from_secs(settings.liveness_timeout_secs)
                .max(MIN_PERIOD),
            backoff: BackoffPolicy::from_millis(
                &settings.reconnect_backoff_ms,
                settings.max_reconnect_attempts,
            ),
            close_timeout: Duration::from_millis(settings.close_timeout_ms),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs)
                .max(MIN_PERIOD),
            event_buffer: settings.event_buffer.max(1),
        }
    }
}

impl ClientConfig {
    /// Socket URL for a token fetch result
    pub fn endpoint(&self, info: &DanmuServerInfo) -> String {
        let scheme = if self.use_tls { "wss" } else { "ws" };
        match info.port {
            Some(port) => format!("{scheme}://{}:{port}{SOCKET_PATH}", info.host),
            None => format!("{scheme}://{}{SOCKET_PATH}", info.host),
        }
    }
}

//! Client error types

use danmaku_common::AppError;
use danmaku_core::{DomainError, RoomId};
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::protocol::{FrameError, ProtocolVersion};

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // Per-message errors (logged and skipped)
    // =========================================================================
    /// Header could not be decoded
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),

    /// Notification payload could not be inflated
    #[error("Decompression failed for {version}: {source}")]
    DecompressionFailed {
        version: ProtocolVersion,
        #[source]
        source: std::io::Error,
    },

    /// Notification body is not a usable JSON command
    #[error("Invalid command {cmd}: {reason}")]
    InvalidCommand { cmd: String, reason: String },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    // =========================================================================
    // Connection errors
    // =========================================================================
    /// Server refused the auth packet
    #[error("Authentication failed for room {room_id}: {reason}")]
    AuthenticationFailed { room_id: RoomId, reason: String },

    /// Token collaborator failed
    #[error("Token fetch failed: {0}")]
    TokenFetchFailed(#[source] DomainError),

    /// Socket closed without the owner asking
    #[error("Transport closed")]
    TransportClosed,

    /// Socket-level failure
    #[error("Transport error: {0}")]
    Transport(#[source] Box<tungstenite::Error>),

    /// No frame of any kind arrived within the liveness window
    #[error("No frames received for {0:?}")]
    LivenessTimeout(Duration),

    #[error("Timed out during {0}")]
    Timeout(&'static str),

    /// The attempt was abandoned by a disconnect
    #[error("Cancelled")]
    Cancelled,

    /// Reconnect cap reached, automatic retries stop
    #[error("Reconnect attempts exhausted for room {room_id} after {attempts} attempts")]
    ReconnectExhausted { room_id: RoomId, attempts: u32 },

    /// Domain error (chat pass-through)
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<tungstenite::Error> for ClientError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl ClientError {
    /// Get an error code string for logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedFrame(_) => "MALFORMED_FRAME",
            Self::DecompressionFailed { .. } => "DECOMPRESSION_FAILED",
            Self::InvalidCommand { .. } => "INVALID_COMMAND",
            Self::Json(_) => "INVALID_JSON",
            Self::AuthenticationFailed { .. } => "AUTHENTICATION_FAILED",
            Self::TokenFetchFailed(_) => "TOKEN_FETCH_FAILED",
            Self::TransportClosed => "TRANSPORT_CLOSED",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::LivenessTimeout(_) => "LIVENESS_TIMEOUT",
            Self::Timeout(_) => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::ReconnectExhausted { .. } => "RECONNECT_EXHAUSTED",
            Self::Domain(e) => e.code(),
        }
    }

    /// Check if the reconnect state machine heals this error on its own
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame(_)
                | Self::DecompressionFailed { .. }
                | Self::InvalidCommand { .. }
                | Self::Json(_)
                | Self::TokenFetchFailed(_)
                | Self::TransportClosed
                | Self::Transport(_)
                | Self::LivenessTimeout(_)
                | Self::Timeout(_)
        )
    }

    /// Check if an operator has to issue a new connect
    pub fn is_operator_visible(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. } | Self::ReconnectExhausted { .. }
        )
    }

    pub(crate) fn invalid_command(cmd: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidCommand {
            cmd: cmd.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Client result type
pub type ClientResult<T> = Result<T, ClientError>;

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Domain(e) => Self::Domain(e),
            other => Self::client(other),
        }
    }
}

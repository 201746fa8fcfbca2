//! Domain errors - failures reported by collaborators

use thiserror::Error;

use crate::value_objects::RoomId;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    #[error("Failed to fetch danmaku token for room {room_id}: {reason}")]
    TokenFetch { room_id: RoomId, reason: String },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Failed to send chat message: {0}")]
    ChatSend(String),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Invalid room id: {0}")]
    InvalidRoomId(String),

    #[error("Chat message is empty")]
    EmptyMessage,
}

impl DomainError {
    /// Get an error code string for logs and status surfaces
    pub fn code(&self) -> &'static str {
        match self {
            Self::TokenFetch { .. } => "TOKEN_FETCH_FAILED",
            Self::Session(_) => "SESSION_ERROR",
            Self::ChatSend(_) => "CHAT_SEND_FAILED",
            Self::InvalidRoomId(_) => "INVALID_ROOM_ID",
            Self::EmptyMessage => "EMPTY_MESSAGE",
        }
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidRoomId(_) | Self::EmptyMessage)
    }

    /// Create a token fetch error
    pub fn token_fetch(room_id: RoomId, reason: impl std::fmt::Display) -> Self {
        Self::TokenFetch {
            room_id,
            reason: reason.to_string(),
        }
    }
}

/// Result type for collaborator operations
pub type DomainResult<T> = Result<T, DomainError>;

//! Application error types
//!
//! Errors surfaced at the binary edge. Library code returns its own typed
//! errors; this enum collects them for `main`.

use danmaku_core::DomainError;
use std::fmt;

use crate::auth::CookieError;
use crate::config::ConfigError;
use crate::telemetry::TracingError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Startup errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tracing error: {0}")]
    Tracing(#[from] TracingError),

    #[error("Session error: {0}")]
    Cookie(#[from] CookieError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Runtime errors
    #[error("Client error: {0}")]
    Client(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    /// Get error code for logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Tracing(_) => "TRACING_ERROR",
            Self::Cookie(_) => "COOKIE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Client(_) => "CLIENT_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Domain(e) => e.code(),
        }
    }

    /// Check if this error happened before the client started
    #[must_use]
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Tracing(_) | Self::Cookie(_)
        )
    }

    /// Create a client error from any displayable error
    #[must_use]
    pub fn client(err: impl fmt::Display) -> Self {
        Self::Client(err.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

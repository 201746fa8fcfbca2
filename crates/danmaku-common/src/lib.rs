//! # danmaku-common
//!
//! Shared utilities including configuration, error handling, cookie-based
//! session identity, and telemetry.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{CookieError, CookieJar, CookieSession};
pub use config::{
    AppConfig, AppSettings, ClientSettings, ConfigError, Environment, LiveApiConfig,
    SessionConfig,
};
pub use error::{AppError, AppResult};
pub use telemetry::{try_init_tracing, try_init_tracing_with_config, TracingConfig, TracingError};

//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file).

use danmaku_core::RoomId;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    /// Room to stream, required only by the binary
    pub room_id: Option<RoomId>,
    pub live_api: LiveApiConfig,
    pub session: SessionConfig,
    pub client: ClientSettings,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// HTTP live-API collaborator configuration
#[derive(Debug, Clone)]
pub struct LiveApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Session identity configuration
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Netscape cookie file, anonymous session when unset
    pub cookie_file: Option<PathBuf>,
}

/// Socket client tuning
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub use_tls: bool,
    pub heartbeat_interval_secs: u64,
    pub liveness_timeout_secs: u64,
    pub max_reconnect_attempts: u32,
    pub reconnect_backoff_ms: Vec<u64>,
    pub close_timeout_ms: u64,
    pub connect_timeout_secs: u64,
    pub event_buffer: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            use_tls: true,
            heartbeat_interval_secs: default_heartbeat_interval(),
            liveness_timeout_secs: default_liveness_timeout(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_backoff_ms: default_reconnect_backoff(),
            close_timeout_ms: default_close_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            event_buffer: default_event_buffer(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "danmaku-client".to_string()
}

fn default_live_api_base_url() -> String {
    "https://api.live.bilibili.com".to_string()
}

fn default_http_timeout() -> u64 {
    10
}

fn default_heartbeat_interval() -> u64 {
    20
}

fn default_liveness_timeout() -> u64 {
    60
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_backoff() -> Vec<u64> {
    vec![1000, 2000, 3000, 5000, 8000]
}

fn default_close_timeout() -> u64 {
    2000 // 2 seconds
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_event_buffer() -> usize {
    1024
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is present but cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        Ok(Self {
            app: AppSettings {
                name: vars.get("APP_NAME").unwrap_or_else(default_app_name),
                env: vars
                    .get("APP_ENV")
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
            },
            room_id: vars
                .get("ROOM_ID")
                .map(|s| {
                    RoomId::parse(&s).map_err(|e| ConfigError::InvalidValue("ROOM_ID", e.to_string()))
                })
                .transpose()?,
            live_api: LiveApiConfig {
                base_url: vars
                    .get("LIVE_API_BASE_URL")
                    .map(|s| s.trim_end_matches('/').to_string())
                    .unwrap_or_else(default_live_api_base_url),
                timeout_secs: vars.parse_or("HTTP_TIMEOUT_SECS", default_http_timeout)?,
            },
            session: SessionConfig {
                cookie_file: vars
                    .get("COOKIE_FILE")
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from),
            },
            client: ClientSettings {
                use_tls: vars.parse_or("WS_USE_TLS", || true)?,
                heartbeat_interval_secs: vars
                    .positive_or("HEARTBEAT_INTERVAL_SECS", default_heartbeat_interval)?,
                liveness_timeout_secs: vars
                    .positive_or("LIVENESS_TIMEOUT_SECS", default_liveness_timeout)?,
                max_reconnect_attempts: vars
                    .parse_or("MAX_RECONNECT_ATTEMPTS", default_max_reconnect_attempts)?,
                reconnect_backoff_ms: vars
                    .get("RECONNECT_BACKOFF_MS")
                    .map(|s| parse_backoff(&s))
                    .transpose()?
                    .unwrap_or_else(default_reconnect_backoff),
                close_timeout_ms: vars.parse_or("CLOSE_TIMEOUT_MS", default_close_timeout)?,
                connect_timeout_secs: vars
                    .positive_or("CONNECT_TIMEOUT_SECS", default_connect_timeout)?,
                event_buffer: vars.parse_or("EVENT_BUFFER", default_event_buffer)?,
            },
        })
    }

    /// Get the configured room, failing if `ROOM_ID` was not set
    pub fn require_room_id(&self) -> Result<RoomId, ConfigError> {
        self.room_id.ok_or(ConfigError::MissingVar("ROOM_ID"))
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn parse_or<T, D>(&self, key: &'static str, default: D) -> Result<T, ConfigError>
    where
        T: FromStr,
        D: FnOnce() -> T,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key, raw)),
            None => Ok(default()),
        }
    }

    /// Like `parse_or`, but zero is rejected
    fn positive_or<D>(&self, key: &'static str, default: D) -> Result<u64, ConfigError>
    where
        D: FnOnce() -> u64,
    {
        match self.parse_or(key, default)? {
            0 => Err(ConfigError::InvalidValue(key, "0".to_string())),
            value => Ok(value),
        }
    }
}

fn parse_backoff(raw: &str) -> Result<Vec<u64>, ConfigError> {
    let table = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<u64>, _>>()
        .map_err(|_| ConfigError::InvalidValue("RECONNECT_BACKOFF_MS", raw.to_string()))?;

    if table.is_empty() {
        return Err(ConfigError::InvalidValue(
            "RECONNECT_BACKOFF_MS",
            raw.to_string(),
        ));
    }

    Ok(table)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, ClientSettings, ConfigError, Environment, LiveApiConfig,
    SessionConfig,
};

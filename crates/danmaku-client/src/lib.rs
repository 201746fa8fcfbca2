//! # danmaku-client
//!
//! Client for the live-room danmaku socket: binary framing, payload
//! decompression, the auth handshake, heartbeat and receive loops, command
//! dispatch into domain events, and a reconnecting connection manager.

pub mod api;
pub mod config;
pub mod connection;
pub mod events;
pub mod handlers;
pub mod protocol;

pub use api::LiveApiClient;
pub use config::ClientConfig;
pub use connection::{
    BackoffPolicy, ConnectionManager, ConnectionManagerBuilder, ConnectionState, CurrentRoom,
};
pub use events::ClientEvent;
pub use handlers::{ClientError, ClientResult, MessageDispatcher};

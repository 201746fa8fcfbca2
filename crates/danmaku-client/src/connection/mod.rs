//! Connection management

mod backoff;
mod connection;
mod manager;
mod state;

pub use backoff::BackoffPolicy;
pub(crate) use connection::{Liveness, RoomConnection, SharedSink, WsSource};
pub use manager::{ConnectionManager, ConnectionManagerBuilder};
pub use state::{ConnectionState, CurrentRoom};

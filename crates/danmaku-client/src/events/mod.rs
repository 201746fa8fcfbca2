//! Events emitted to the consumer of a connection manager

mod client_event;

pub use client_event::ClientEvent;

//! HTTP collaborators for the live-room web API

mod live_api;

pub use live_api::LiveApiClient;

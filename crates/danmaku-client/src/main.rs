//! Danmaku client entry point
//!
//! Run with:
//! ```bash
//! ROOM_ID=21452505 cargo run -p danmaku-client
//! ```
//!
//! Configuration is loaded from environment variables (and `.env`).

use danmaku_client::{
    ClientConfig, ClientEvent, ConnectionManager, ConnectionState, LiveApiClient,
};
use danmaku_common::{
    try_init_tracing_with_config, AppConfig, AppError, AppResult, CookieSession, TracingConfig,
};
use danmaku_core::DomainEvent;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, code = e.error_code(), "Client stopped");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> AppResult<()> {
    let room_id = config.require_room_id()?;
    info!(
        app = %config.app.name,
        env = ?config.app.env,
        room_id = %room_id,
        "Configuration loaded"
    );

    let session = Arc::new(CookieSession::load(config.session.cookie_file.as_deref())?);
    info!(uid = session.uid(), "Session loaded");

    let api = Arc::new(
        LiveApiClient::new(&config.live_api, session.clone()).map_err(AppError::internal)?,
    );

    let (manager, mut events) = ConnectionManager::builder(api.clone())
        .config(ClientConfig::from(&config.client))
        .session(session)
        .chat_sender(api)
        .build();

    manager.connect(room_id).await?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Shutdown requested");
                break;
            }
            event = events.recv() => match event {
                Some(event) => {
                    log_event(&event);
                    if manager.state() == ConnectionState::Failed {
                        return Err(AppError::client(format!("connection to room {room_id} failed")));
                    }
                }
                None => break,
            },
        }
    }

    manager.disconnect(room_id).await;
    Ok(())
}

fn log_event(event: &ClientEvent) {
    match event {
        ClientEvent::Domain { room_id, event } => match event {
            DomainEvent::Chat(chat) => {
                info!(room_id = %room_id, user = %chat.user_name, "{}", chat.content);
            }
            other => info!(
                room_id = %room_id,
                event_type = other.event_type(),
                user = other.user_name(),
                "{}",
                other.content()
            ),
        },
        ClientEvent::Popularity { room_id, count } => {
            tracing::debug!(room_id = %room_id, count, "Popularity");
        }
        ClientEvent::StateChanged { room_id, state } => {
            info!(room_id = %room_id, state = %state, "Connection state");
        }
    }
}

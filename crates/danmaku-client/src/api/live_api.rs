//! Live API client
//!
//! Resolves rooms, fetches danmaku tokens, and posts outbound chat. Every
//! request carries the session cookie and browser-like headers; the endpoints
//! reject bare clients.

use async_trait::async_trait;
use danmaku_common::LiveApiConfig;
use danmaku_core::{
    ChatSender, DanmuServerInfo, DomainError, DomainResult, RoomId, SessionIdentity,
    SessionProvider, TokenProvider,
};
use reqwest::header::{COOKIE, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const LIVE_SITE: &str = "https://live.bilibili.com";

/// Used when the server returns an empty host list
const FALLBACK_HOST: &str = "broadcastlv.chat.bilibili.com";

// Chat form defaults: white, scrolling, normal size
const CHAT_COLOR: &str = "16777215";
const CHAT_MODE: &str = "1";
const CHAT_FONT_SIZE: &str = "25";

/// Envelope shared by every live API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    code: i64,
    #[serde(default)]
    message: String,
    /// Some endpoints report the reason here instead
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Fail on a non-zero code
    fn check(self) -> Result<Self, String> {
        if self.code == 0 {
            return Ok(self);
        }
        let reason = if self.message.is_empty() {
            &self.msg
        } else {
            &self.message
        };
        Err(format!("code {}: {reason}", self.code))
    }

    fn into_data(self) -> Result<T, String> {
        self.check()?
            .data
            .ok_or_else(|| "response without data".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct RoomInit {
    #[serde(default)]
    room_id: i64,
}

#[derive(Debug, Deserialize)]
struct DanmuInfo {
    #[serde(default)]
    token: String,
    #[serde(default)]
    host_list: Vec<DanmuHost>,
}

#[derive(Debug, Deserialize)]
struct DanmuHost {
    host: String,
}

impl DanmuInfo {
    fn into_server_info(self, room_id: RoomId) -> DanmuServerInfo {
        let host = self
            .host_list
            .into_iter()
            .next()
            .map_or_else(|| FALLBACK_HOST.to_string(), |h| h.host);
        DanmuServerInfo {
            room_id,
            host,
            port: None,
            token: self.token,
        }
    }
}

/// HTTP client for the live-room web API
///
/// Implements [`TokenProvider`] and [`ChatSender`] for the connection
/// manager.
#[derive(Clone)]
pub struct LiveApiClient {
    client: Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
}

impl LiveApiClient {
    pub fn new(
        config: &LiveApiConfig,
        session: Arc<dyn SessionProvider>,
    ) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(client, &config.base_url, session))
    }

    /// Create a client around a pre-configured HTTP client
    pub fn with_client(
        client: Client,
        base_url: &str,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a (possibly short) room id to the real room id
    pub async fn resolve_room(&self, room_id: RoomId) -> DomainResult<RoomId> {
        let identity = self.session.identity();
        let url = format!("{}/room/v1/Room/room_init", self.base_url);
        let request = self.client.get(url).query(&[("id", room_id.into_inner())]);

        let init: RoomInit = self
            .fetch(request, &identity)
            .await
            .and_then(ApiResponse::into_data)
            .map_err(|reason| DomainError::token_fetch(room_id, reason))?;

        if init.room_id <= 0 {
            return Err(DomainError::token_fetch(
                room_id,
                format!("invalid resolved room id {}", init.room_id),
            ));
        }
        let real = RoomId::new(init.room_id);
        if real != room_id {
            tracing::debug!(room_id = %room_id, real_room_id = %real, "Resolved short room id");
        }
        Ok(real)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        identity: &SessionIdentity,
    ) -> Result<ApiResponse<T>, String> {
        let response = with_browser_headers(request, identity)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        response
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| e.to_string())
    }
}

fn with_browser_headers(request: RequestBuilder, identity: &SessionIdentity) -> RequestBuilder {
    let request = request
        .header(USER_AGENT, BROWSER_USER_AGENT)
        .header(REFERER, format!("{LIVE_SITE}/"))
        .header(ORIGIN, LIVE_SITE);
    match &identity.cookie_header {
        Some(cookie) => request.header(COOKIE, cookie),
        None => request,
    }
}

#[async_trait]
impl TokenProvider for LiveApiClient {
    async fn danmu_info(&self, room_id: RoomId) -> DomainResult<DanmuServerInfo> {
        let real = self.resolve_room(room_id).await?;

        let identity = self.session.identity();
        let url = format!("{}/xlive/web-room/v1/index/getDanmuInfo", self.base_url);
        let request = self.client.get(url).query(&[("id", real.into_inner())]);

        let info: DanmuInfo = self
            .fetch(request, &identity)
            .await
            .and_then(ApiResponse::into_data)
            .map_err(|reason| DomainError::token_fetch(room_id, reason))?;

        let info = info.into_server_info(real);
        tracing::debug!(room_id = %room_id, host = %info.host, "Fetched danmaku token");
        Ok(info)
    }
}

#[async_trait]
impl ChatSender for LiveApiClient {
    async fn send_chat(&self, room_id: RoomId, text: &str) -> DomainResult<()> {
        let identity = self.session.identity();
        let Some(csrf) = identity.csrf.clone() else {
            return Err(DomainError::ChatSend(
                "not logged in (no bili_jct cookie)".to_string(),
            ));
        };

        let room = room_id.to_string();
        let rnd = chrono::Utc::now().timestamp().to_string();
        let form = [
            ("roomid", room.as_str()),
            ("msg", text),
            ("color", CHAT_COLOR),
            ("mode", CHAT_MODE),
            ("fontsize", CHAT_FONT_SIZE),
            ("rnd", rnd.as_str()),
            ("csrf", csrf.as_str()),
            ("csrf_token", csrf.as_str()),
        ];

        let url = format!("{}/msg/send", self.base_url);
        let request = self.client.post(url).form(&form);

        self.fetch::<serde_json::Value>(request, &identity)
            .await
            .and_then(ApiResponse::check)
            .map(|_| ())
            .map_err(DomainError::ChatSend)
    }
}

//! Live API client tests against a mocked HTTP server
//!
//! Run with: cargo test -p integration-tests --test live_api_tests

use std::sync::Arc;

use danmaku_client::LiveApiClient;
use danmaku_common::{CookieJar, CookieSession, LiveApiConfig};
use danmaku_core::{ChatSender, DomainError, RoomId, SessionProvider, TokenProvider};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COOKIES: &str = "DedeUserID=42; bili_jct=csrf123; buvid3=BUVID-1; SESSDATA=s";

fn client(server: &MockServer, session: CookieSession) -> LiveApiClient {
    let config = LiveApiConfig {
        base_url: server.uri(),
        timeout_secs: 5,
    };
    LiveApiClient::new(&config, Arc::new(session)).unwrap()
}

fn logged_in() -> CookieSession {
    CookieSession::new(CookieJar::parse_header(COOKIES))
}

async fn mount_room_init(server: &MockServer, short: i64, real: i64) {
    Mock::given(method("GET"))
        .and(path("/room/v1/Room/room_init"))
        .and(query_param("id", short.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "message": "ok",
            "data": {"room_id": real, "short_id": short}
        })))
        .mount(server)
        .await;
}

// ============================================================================
// Token provider
// ============================================================================

#[tokio::test]
async fn test_danmu_info_resolves_room_and_host() {
    let server = MockServer::start().await;
    let session = logged_in();
    let cookie = session.identity().cookie_header.unwrap();

    mount_room_init(&server, 1, 5050).await;
    Mock::given(method("GET"))
        .and(path("/xlive/web-room/v1/index/getDanmuInfo"))
        .and(query_param("id", "5050"))
        .and(header("cookie", cookie.as_str()))
        .and(header("referer", "https://live.bilibili.com/"))
        .and(header("origin", "https://live.bilibili.com"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "message": "0",
            "data": {
                "token": "tok",
                "host_list": [
                    {"host": "zj-cn-live-comet.chat.bilibili.com", "port": 2243, "wss_port": 443},
                    {"host": "broadcastlv.chat.bilibili.com", "port": 2243, "wss_port": 443}
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let info = client(&server, session)
        .danmu_info(RoomId::new(1))
        .await
        .unwrap();

    assert_eq!(info.room_id, RoomId::new(5050));
    assert_eq!(info.host, "zj-cn-live-comet.chat.bilibili.com");
    assert_eq!(info.token, "tok");
    assert_eq!(info.port, None);
}

#[tokio::test]
async fn test_danmu_info_error_code() {
    let server = MockServer::start().await;
    mount_room_init(&server, 7, 7).await;
    Mock::given(method("GET"))
        .and(path("/xlive/web-room/v1/index/getDanmuInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": -352,
            "message": "-352",
            "data": null
        })))
        .mount(&server)
        .await;

    let err = client(&server, CookieSession::anonymous())
        .danmu_info(RoomId::new(7))
        .await
        .unwrap_err();

    match err {
        DomainError::TokenFetch { room_id, reason } => {
            assert_eq!(room_id, RoomId::new(7));
            assert!(reason.contains("-352"), "{reason}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_room_fails_before_token_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/room/v1/Room/room_init"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 60004,
            "msg": "直播间不存在",
            "message": "直播间不存在",
            "data": {}
        })))
        .mount(&server)
        .await;
    Mock::given(path("/xlive/web-room/v1/index/getDanmuInfo"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server, CookieSession::anonymous())
        .danmu_info(RoomId::new(404))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "TOKEN_FETCH_FAILED");
    assert!(err.to_string().contains("直播间不存在"));
}

#[tokio::test]
async fn test_http_error_status() {
    let server = MockServer::start().await;
    Mock::given(path("/room/v1/Room/room_init"))
        .respond_with(ResponseTemplate::new(412))
        .mount(&server)
        .await;

    let err = client(&server, CookieSession::anonymous())
        .danmu_info(RoomId::new(1))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("412"));
}

// ============================================================================
// Chat sender
// ============================================================================

#[tokio::test]
async fn test_send_chat_posts_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/msg/send"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("roomid=5050"))
        .and(body_string_contains("msg=hello"))
        .and(body_string_contains("color=16777215"))
        .and(body_string_contains("mode=1"))
        .and(body_string_contains("fontsize=25"))
        .and(body_string_contains("csrf=csrf123"))
        .and(body_string_contains("csrf_token=csrf123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": [],
            "message": "",
            "msg": ""
        })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server, logged_in())
        .send_chat(RoomId::new(5050), "hello")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_send_chat_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/msg/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 10030,
            "message": "您发送弹幕的频率过快",
            "msg": "您发送弹幕的频率过快"
        })))
        .mount(&server)
        .await;

    let err = client(&server, logged_in())
        .send_chat(RoomId::new(5050), "spam")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::ChatSend(ref reason) if reason.contains("10030")));
}

#[tokio::test]
async fn test_send_chat_requires_login() {
    let server = MockServer::start().await;
    Mock::given(path("/msg/send"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server, CookieSession::anonymous())
        .send_chat(RoomId::new(5050), "hello")
        .await
        .unwrap_err();

    assert_eq!(err.code(), "CHAT_SEND_FAILED");
}

//! Notification command parsing
//!
//! Turns one JSON notification body into at most one [`DomainEvent`],
//! switching on its `cmd` field.

use chrono::{DateTime, TimeZone, Utc};
use danmaku_core::{
    ChatEvent, DomainEvent, GiftEvent, GuardLevel, GuardPurchaseEvent, NoticeEvent,
    SuperChatEvent, ViewerCountEvent, SYSTEM_USER_NAME,
};
use serde_json::Value;

use super::error::{ClientError, ClientResult};

/// Sender shown on moderation notices
const NOTICE_USER_NAME: &str = "系统通知";

const ADMIN_BADGE: &str = "【管理员】";
const VIP_BADGE: &str = "【VIP】";

const GUARD_COLOR: &str = "#FFB03C";
const WARNING_COLOR: &str = "#FF4444";
const CUT_OFF_COLOR: &str = "#FF0000";

const DEFAULT_WARNING: &str = "直播警告";
const DEFAULT_CUT_OFF: &str = "直播被切断";
const UNKNOWN_USER: &str = "未知用户";
const UNKNOWN_GIFT: &str = "未知礼物";

/// Locate the JSON object inside a notification body
///
/// Bodies sometimes carry control bytes around the document, so the object
/// is taken from the first `{` to the last `}`.
pub fn extract_json(body: &[u8]) -> Option<&[u8]> {
    let start = body.iter().position(|&b| b == b'{')?;
    let end = body.iter().rposition(|&b| b == b'}')?;
    (start < end).then(|| &body[start..=end])
}

/// Parse one notification body
///
/// Returns `Ok(None)` for commands this client does not render.
pub fn parse_command(body: &[u8]) -> ClientResult<Option<DomainEvent>> {
    let json = extract_json(body).ok_or_else(|| ClientError::invalid_command("?", "no JSON object in body"))?;
    let message: Value = serde_json::from_slice(json)?;

    let Some(cmd) = message.get("cmd").and_then(Value::as_str) else {
        return Ok(None);
    };

    // DANMU_MSG:4:0:2:2:2:0 and friends
    let base = cmd.split(':').next().unwrap_or(cmd);
    let now = Utc::now();

    let event = match base {
        "DANMU_MSG" => parse_chat(&message, now)?,
        "SEND_GIFT" => parse_gift(&message, now)?,
        "SUPER_CHAT_MESSAGE" => parse_super_chat(&message, now)?,
        "GUARD_BUY" => parse_guard(&message, now)?,
        "WARNING" => DomainEvent::Warning(notice(&message, DEFAULT_WARNING, WARNING_COLOR, now)),
        "CUT_OFF" => DomainEvent::StreamCut(notice(&message, DEFAULT_CUT_OFF, CUT_OFF_COLOR, now)),
        "ONLINE_RANK_COUNT" => {
            let count = require_u64(&message, "ONLINE_RANK_COUNT", &["data", "count"])?;
            DomainEvent::OnlineCount(ViewerCountEvent {
                user_name: SYSTEM_USER_NAME.to_string(),
                content: format!("当前观看人数: {count}"),
                count,
                timestamp: now,
            })
        }
        "WATCHED_CHANGE" => {
            let count = require_u64(&message, "WATCHED_CHANGE", &["data", "num"])?;
            DomainEvent::WatchedCount(ViewerCountEvent {
                user_name: SYSTEM_USER_NAME.to_string(),
                content: format!("观看过的人数: {count}"),
                count,
                timestamp: now,
            })
        }
        _ => {
            tracing::trace!(cmd, "Ignoring command");
            return Ok(None);
        }
    };

    Ok(Some(event))
}

fn parse_chat(message: &Value, now: DateTime<Utc>) -> ClientResult<DomainEvent> {
    let info = message
        .get("info")
        .ok_or_else(|| ClientError::invalid_command("DANMU_MSG", "missing info"))?;

    let content = info
        .get(1)
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::invalid_command("DANMU_MSG", "missing info[1]"))?;
    let user = info
        .get(2)
        .ok_or_else(|| ClientError::invalid_command("DANMU_MSG", "missing info[2]"))?;
    let user_name = user.get(1).and_then(Value::as_str).unwrap_or(UNKNOWN_USER);

    let mut display_name = user_name.to_string();
    if let Some(medal) = medal_tag(info.get(3)) {
        display_name = format!("{medal} {display_name}");
    }
    if is_flag_set(user.get(2)) {
        display_name = format!("{ADMIN_BADGE}{display_name}");
    }
    if is_flag_set(user.get(3)) {
        display_name = format!("{VIP_BADGE}{display_name}");
    }

    let meta = info.get(0);
    let color = meta
        .and_then(|m| m.get(3))
        .and_then(Value::as_u64)
        .map(|rgb| format!("#{:06X}", rgb & 0x00FF_FFFF));
    let timestamp = meta
        .and_then(|m| m.get(4))
        .and_then(Value::as_i64)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or(now);

    Ok(DomainEvent::Chat(ChatEvent {
        user_name: display_name,
        content: content.to_string(),
        color,
        timestamp,
    }))
}

/// `[name level]` tag from `info[3] = [level, name, ...]`
fn medal_tag(medal: Option<&Value>) -> Option<String> {
    let medal = medal?.as_array()?;
    let name = medal.get(1)?.as_str().filter(|s| !s.is_empty())?;
    let level = medal.first()?.as_i64()?;
    Some(format!("[{name}{level}]"))
}

/// Badge flags arrive as either the number 1 or the string "1"
fn is_flag_set(flag: Option<&Value>) -> bool {
    match flag {
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => s == "1",
        _ => false,
    }
}

fn parse_gift(message: &Value, now: DateTime<Utc>) -> ClientResult<DomainEvent> {
    let data = data(message, "SEND_GIFT")?;
    let user_name = str_or(data, "uname", UNKNOWN_USER);
    let gift_name = str_or(data, "giftName", UNKNOWN_GIFT);
    let count = require_u32(message, "SEND_GIFT", &["data", "num"])?;

    Ok(DomainEvent::Gift(GiftEvent {
        user_name: user_name.to_string(),
        content: format!("赠送 {gift_name} x{count}"),
        gift_name: gift_name.to_string(),
        count,
        timestamp: now,
    }))
}

fn parse_super_chat(message: &Value, now: DateTime<Utc>) -> ClientResult<DomainEvent> {
    let data = data(message, "SUPER_CHAT_MESSAGE")?;
    let user_name = data
        .get("user_info")
        .map_or(UNKNOWN_USER, |u| str_or(u, "uname", UNKNOWN_USER));
    let price = require_u32(message, "SUPER_CHAT_MESSAGE", &["data", "price"])?;

    Ok(DomainEvent::SuperChat(SuperChatEvent {
        user_name: user_name.to_string(),
        content: str_or(data, "message", "").to_string(),
        price,
        color: data
            .get("message_font_color")
            .and_then(Value::as_str)
            .map(str::to_string),
        timestamp: now,
    }))
}

fn parse_guard(message: &Value, now: DateTime<Utc>) -> ClientResult<DomainEvent> {
    let data = data(message, "GUARD_BUY")?;
    let level = GuardLevel::from_level(i64::from(require_u32(
        message,
        "GUARD_BUY",
        &["data", "guard_level"],
    )?));
    let months = require_u32(message, "GUARD_BUY", &["data", "num"])?;

    Ok(DomainEvent::GuardPurchase(GuardPurchaseEvent {
        user_name: str_or(data, "username", UNKNOWN_USER).to_string(),
        content: format!("购买了 {months} 个月的{level}"),
        guard_level: level,
        months,
        color: GUARD_COLOR.to_string(),
        timestamp: now,
    }))
}

fn notice(message: &Value, default: &str, color: &str, now: DateTime<Utc>) -> NoticeEvent {
    NoticeEvent {
        user_name: NOTICE_USER_NAME.to_string(),
        content: str_or(message, "msg", default).to_string(),
        color: color.to_string(),
        timestamp: now,
    }
}

fn data<'a>(message: &'a Value, cmd: &str) -> ClientResult<&'a Value> {
    message
        .get("data")
        .filter(|d| d.is_object())
        .ok_or_else(|| ClientError::invalid_command(cmd, "missing data"))
}

fn str_or<'a>(value: &'a Value, key: &str, default: &'a str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn require_u64(message: &Value, cmd: &str, path: &[&str]) -> ClientResult<u64> {
    path.iter()
        .try_fold(message, |v, key| v.get(key))
        .and_then(Value::as_u64)
        .ok_or_else(|| ClientError::invalid_command(cmd, format!("missing {}", path.join("."))))
}

fn require_u32(message: &Value, cmd: &str, path: &[&str]) -> ClientResult<u32> {
    let value = require_u64(message, cmd, path)?;
    u32::try_from(value).map_err(|_| {
        ClientError::invalid_command(cmd, format!("{} out of range: {value}", path.join(".")))
    })
}

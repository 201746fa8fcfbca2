//! Auth packet sent once on every fresh socket

use danmaku_core::{RoomId, SessionIdentity};
use serde::{Deserialize, Serialize};

use super::frame::Frame;
use super::opcodes::{Operation, ProtocolVersion};

/// Protocol version requested from the server (brotli notifications)
const REQUESTED_PROTOVER: u8 = 3;

/// Client type reported by web viewers
const CLIENT_TYPE: u8 = 2;

const PLATFORM: &str = "web";

/// Login packet body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPacket {
    pub uid: u64,
    pub roomid: RoomId,
    pub protover: u8,
    pub platform: String,
    #[serde(rename = "type")]
    pub client_type: u8,
    pub key: String,
    pub buvid: String,
    /// Unix seconds
    pub client_timestamp: i64,
}

impl AuthPacket {
    /// Build the packet for a room, token, and viewer identity
    pub fn new(room_id: RoomId, token: impl Into<String>, identity: &SessionIdentity) -> Self {
        Self {
            uid: identity.uid,
            roomid: room_id,
            protover: REQUESTED_PROTOVER,
            platform: PLATFORM.to_string(),
            client_type: CLIENT_TYPE,
            key: token.into(),
            buvid: identity.buvid.clone(),
            client_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Serialize and wrap as an operation-7 frame
    pub fn to_frame(&self) -> Result<Vec<u8>, serde_json::Error> {
        let body = serde_json::to_vec(self)?;
        Ok(Frame::encode(Operation::Auth, ProtocolVersion::Plain, &body))
    }
}

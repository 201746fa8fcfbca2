//! Operation codes and protocol versions carried in every frame header

/// Frame operation codes
///
/// The operation selects what a frame is for. Unknown values are kept raw in
/// [`FrameHeader`](super::FrameHeader) so they can be logged and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Operation {
    /// Heartbeat - keep connection alive (client only)
    Heartbeat = 2,
    /// Heartbeat reply - carries the room popularity count (server only)
    HeartbeatReply = 3,
    /// Notification - one or more JSON commands (server only)
    Notification = 5,
    /// Auth - login packet, sent once per connection (client only)
    Auth = 7,
    /// Auth reply - login acknowledgement (server only)
    AuthReply = 8,
}

impl Operation {
    /// Create an `Operation` from a raw header value
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            2 => Some(Self::Heartbeat),
            3 => Some(Self::HeartbeatReply),
            5 => Some(Self::Notification),
            7 => Some(Self::Auth),
            8 => Some(Self::AuthReply),
            _ => None,
        }
    }

    /// Get the raw header value
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Check if this operation is sent by the client
    #[must_use]
    pub const fn is_client_op(self) -> bool {
        matches!(self, Self::Heartbeat | Self::Auth)
    }

    /// Get the name of this operation
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Heartbeat => "Heartbeat",
            Self::HeartbeatReply => "HeartbeatReply",
            Self::Notification => "Notification",
            Self::Auth => "Auth",
            Self::AuthReply => "AuthReply",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u32())
    }
}

/// Payload encoding declared by the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ProtocolVersion {
    /// Uncompressed JSON
    Json = 0,
    /// Uncompressed, used by heartbeat and auth frames
    Plain = 1,
    /// zlib-compressed sub-frames
    Zlib = 2,
    /// brotli-compressed sub-frames
    Brotli = 3,
}

impl ProtocolVersion {
    /// Create a `ProtocolVersion` from a raw header value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Json),
            1 => Some(Self::Plain),
            2 => Some(Self::Zlib),
            3 => Some(Self::Brotli),
            _ => None,
        }
    }

    /// Get the raw header value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check if the payload holds compressed sub-frames
    #[must_use]
    pub const fn is_compressed(self) -> bool {
        matches!(self, Self::Zlib | Self::Brotli)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Json => "Json",
            Self::Plain => "Plain",
            Self::Zlib => "Zlib",
            Self::Brotli => "Brotli",
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u16())
    }
}

//! Room ID - numeric identifier of a live room
//!
//! Rooms are addressed either by a short vanity id or by their real id; both
//! are positive integers. Zero is reserved as "no room".

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Live room identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RoomId(i64);

impl RoomId {
    /// The "no room" marker
    pub const NONE: Self = Self(0);

    /// Create a new RoomId from a raw i64 value
    #[inline]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    #[inline]
    pub const fn into_inner(self) -> i64 {
        self.0
    }

    /// Check if this is the "no room" marker
    #[inline]
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Parse from string representation
    ///
    /// Only positive integers are accepted.
    pub fn parse(s: &str) -> Result<Self, RoomIdParseError> {
        let id = s
            .trim()
            .parse::<i64>()
            .map_err(|_| RoomIdParseError::InvalidFormat)?;

        if id <= 0 {
            return Err(RoomIdParseError::NotPositive(id));
        }

        Ok(Self(id))
    }
}

/// Error when parsing a RoomId from string
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoomIdParseError {
    #[error("invalid room id format")]
    InvalidFormat,

    #[error("room id must be positive, got {0}")]
    NotPositive(i64),
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RoomId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<RoomId> for i64 {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl std::str::FromStr for RoomId {
    type Err = RoomIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoomId::parse(s)
    }
}

// The live API and the auth packet both carry room ids as JSON numbers
impl Serialize for RoomId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum NumOrString {
            Num(i64),
            Str(String),
        }

        match NumOrString::deserialize(deserializer)? {
            NumOrString::Num(id) => Ok(Self(id)),
            NumOrString::Str(s) => RoomId::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

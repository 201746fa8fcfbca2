//! Value objects

mod guard_level;
mod room_id;

pub use guard_level::GuardLevel;
pub use room_id::{RoomId, RoomIdParseError};

//! Wire protocol: frame codec, payload decompression, and the auth packet

mod auth;
mod decompress;
mod frame;
mod opcodes;

pub use auth::AuthPacket;
pub use decompress::{decompress, SubFrames};
pub use frame::{Frame, FrameError, FrameHeader, HEADER_LEN, SEQUENCE};
pub use opcodes::{Operation, ProtocolVersion};

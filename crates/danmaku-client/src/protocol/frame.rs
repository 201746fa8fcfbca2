//! Frame codec
//!
//! Every packet starts with a 16-byte big-endian header:
//!
//! ```text
//! [u32 total_len][u16 header_len=16][u16 version][u32 operation][u32 sequence=1]
//! ```
//!
//! followed by `total_len - header_len` bytes of payload.

use super::opcodes::{Operation, ProtocolVersion};

/// Fixed header length
pub const HEADER_LEN: usize = 16;

/// Sequence id written into every outbound frame
pub const SEQUENCE: u32 = 1;

/// Header decoding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("buffer holds {0} bytes, need at least 16")]
    TooShort(usize),

    #[error("declared length {declared} outside [16, {available}]")]
    LengthOutOfRange { declared: u32, available: usize },

    #[error("header length {header_len} invalid for frame of {total_len} bytes")]
    BadHeaderLength { header_len: u16, total_len: u32 },
}

/// Decoded header fields
///
/// Operation and version are kept raw so unknown values survive decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub total_len: u32,
    pub header_len: u16,
    pub version: u16,
    pub operation: u32,
    pub sequence: u32,
}

impl FrameHeader {
    /// Decode the header at the start of `buf`
    ///
    /// Fails if fewer than 16 bytes are available, or the declared lengths
    /// do not fit the buffer.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        let Some(head) = buf.get(..HEADER_LEN) else {
            return Err(FrameError::TooShort(buf.len()));
        };

        let header = Self {
            total_len: u32::from_be_bytes([head[0], head[1], head[2], head[3]]),
            header_len: u16::from_be_bytes([head[4], head[5]]),
            version: u16::from_be_bytes([head[6], head[7]]),
            operation: u32::from_be_bytes([head[8], head[9], head[10], head[11]]),
            sequence: u32::from_be_bytes([head[12], head[13], head[14], head[15]]),
        };

        let total = header.total_len as usize;
        if total < HEADER_LEN || total > buf.len() {
            return Err(FrameError::LengthOutOfRange {
                declared: header.total_len,
                available: buf.len(),
            });
        }

        let header_len = header.header_len as usize;
        if header_len < HEADER_LEN || header_len > total {
            return Err(FrameError::BadHeaderLength {
                header_len: header.header_len,
                total_len: header.total_len,
            });
        }

        Ok(header)
    }

    /// Known operation, if any
    pub fn op(&self) -> Option<Operation> {
        Operation::from_u32(self.operation)
    }

    /// Known protocol version, if any
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        ProtocolVersion::from_u16(self.version)
    }
}

/// One frame borrowed from a receive buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub header: FrameHeader,
    pub body: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Decode the frame at the start of `buf`
    ///
    /// Bytes past the declared total length are not part of this frame.
    pub fn decode(buf: &'a [u8]) -> Result<Self, FrameError> {
        let header = FrameHeader::decode(buf)?;
        let body = &buf[header.header_len as usize..header.total_len as usize];
        Ok(Self { header, body })
    }

    /// Encode a frame with the fixed header length and sequence id
    pub fn encode(operation: Operation, version: ProtocolVersion, payload: &[u8]) -> Vec<u8> {
        let total_len = (HEADER_LEN + payload.len()) as u32;

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(&total_len.to_be_bytes());
        out.extend_from_slice(&(HEADER_LEN as u16).to_be_bytes());
        out.extend_from_slice(&version.as_u16().to_be_bytes());
        out.extend_from_slice(&operation.as_u32().to_be_bytes());
        out.extend_from_slice(&SEQUENCE.to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    /// Empty heartbeat frame
    pub fn heartbeat() -> Vec<u8> {
        Self::encode(Operation::Heartbeat, ProtocolVersion::Plain, &[])
    }
}

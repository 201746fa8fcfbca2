//! Notification payload decompression and sub-frame splitting
//!
//! Compressed notifications (version 2 and 3) carry several complete frames
//! back-to-back once inflated. Uncompressed ones carry a single JSON body.

use std::borrow::Cow;
use std::io::Read;

use flate2::read::ZlibDecoder;

use super::frame::{Frame, HEADER_LEN};
use super::opcodes::ProtocolVersion;

/// Read buffer size for the brotli decoder
const BROTLI_BUFFER_SIZE: usize = 4096;

/// Inflate a notification body according to its declared version
///
/// Uncompressed versions are borrowed unchanged.
pub fn decompress(version: ProtocolVersion, body: &[u8]) -> std::io::Result<Cow<'_, [u8]>> {
    match version {
        ProtocolVersion::Json | ProtocolVersion::Plain => Ok(Cow::Borrowed(body)),
        ProtocolVersion::Zlib => {
            let mut out = Vec::with_capacity(body.len() * 4);
            ZlibDecoder::new(body).read_to_end(&mut out)?;
            Ok(Cow::Owned(out))
        }
        ProtocolVersion::Brotli => {
            let mut out = Vec::with_capacity(body.len() * 4);
            brotli::Decompressor::new(body, BROTLI_BUFFER_SIZE).read_to_end(&mut out)?;
            Ok(Cow::Owned(out))
        }
    }
}

/// Iterator over frames concatenated in one buffer
///
/// Stops at the first position that cannot hold a complete frame: fewer than
/// 16 bytes left, a declared length below 16, or a declared length past the
/// end of the buffer.
#[derive(Debug, Clone)]
pub struct SubFrames<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> SubFrames<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Bytes not consumed by the frames yielded so far
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }
}

impl<'a> Iterator for SubFrames<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.buf[self.offset..];
        if rest.len() < HEADER_LEN {
            return None;
        }

        match Frame::decode(rest) {
            Ok(frame) => {
                self.offset += frame.header.total_len as usize;
                Some(frame)
            }
            Err(e) => {
                tracing::debug!(
                    offset = self.offset,
                    remaining = rest.len(),
                    error = %e,
                    "Stopping sub-frame split"
                );
                self.offset = self.buf.len();
                None
            }
        }
    }
}

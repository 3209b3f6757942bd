//! RTP Packet module
//!
//! This module provides structures for handling RTP packets as defined in RFC 3550,
//! the RFC 5285 header extensions negotiated per session and the RTCP codec.

pub mod extension;
pub mod rtcp;
pub mod rtp;

pub use extension::*;
pub use rtp::*;

use bytes::Buf;

use crate::error::{EncodeError, ParseError};

/// Fail with `Truncated` unless `buf` still holds `required` bytes
pub(crate) fn ensure_remaining(buf: &impl Buf, required: usize) -> Result<(), ParseError> {
    if buf.remaining() < required {
        return Err(ParseError::Truncated {
            required,
            available: buf.remaining(),
        });
    }
    Ok(())
}

/// Fail with `BufferTooSmall` unless an output of `available` bytes can take `required`
pub(crate) fn ensure_capacity(required: usize, available: usize) -> Result<(), EncodeError> {
    if available < required {
        return Err(EncodeError::BufferTooSmall { required, available });
    }
    Ok(())
}

/// Hex dump helper used in trace logs
pub fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

//! Packet protection hook
//!
//! Key negotiation (DTLS-SRTP, SDES) lives outside this crate. The session
//! only needs an opaque service that protects serialized packets before they
//! hit the wire and unprotects datagrams before they are parsed.

use bytes::Bytes;

use crate::Result;

/// Encrypt/decrypt service for RTP and RTCP datagrams.
///
/// Implementations keep their own roll-over counters and replay windows and
/// are shared between the send path and the receive loop.
pub trait SrtpContext: Send + Sync {
    /// Protect a serialized RTP packet
    fn protect_rtp(&self, packet: &[u8]) -> Result<Bytes>;

    /// Verify and decrypt a received RTP datagram
    fn unprotect_rtp(&self, packet: &[u8]) -> Result<Bytes>;

    /// Protect a serialized RTCP compound packet
    fn protect_rtcp(&self, packet: &[u8]) -> Result<Bytes>;

    /// Verify and decrypt a received RTCP datagram
    fn unprotect_rtcp(&self, packet: &[u8]) -> Result<Bytes>;
}

/// Context that leaves packets untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughContext;

impl SrtpContext for PassthroughContext {
    fn protect_rtp(&self, packet: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(packet))
    }

    fn unprotect_rtp(&self, packet: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(packet))
    }

    fn protect_rtcp(&self, packet: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(packet))
    }

    fn unprotect_rtcp(&self, packet: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(packet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        let context = PassthroughContext;
        let data = [0x80u8, 96, 0, 1];
        assert_eq!(&context.protect_rtp(&data).unwrap()[..], &data);
        assert_eq!(&context.unprotect_rtcp(&data).unwrap()[..], &data);
    }
}

//! Network transport for RTP/RTCP
//!
//! The session only sees datagrams: it hands serialized (and protected)
//! bytes to the transport and reads classified datagrams back. RTP and RTCP
//! share one flow (RFC 5761 multiplexing), so every received datagram is
//! demultiplexed by its second byte.

use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Result;

pub mod memory;
pub mod udp;

pub use memory::MemoryTransport;
pub use udp::UdpRtpTransport;

/// Lowest second-byte value that marks a multiplexed datagram as RTCP
const RTCP_MUX_MIN: u8 = 192;

/// Highest second-byte value that marks a multiplexed datagram as RTCP
const RTCP_MUX_MAX: u8 = 223;

/// Returns true if a multiplexed datagram carries RTCP
pub fn is_rtcp(data: &[u8]) -> bool {
    matches!(data.get(1), Some(pt) if (RTCP_MUX_MIN..=RTCP_MUX_MAX).contains(pt))
}

/// A received datagram, already demultiplexed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    Rtp(Bytes),
    Rtcp(Bytes),
}

impl Datagram {
    /// Classify raw bytes read from a multiplexed flow
    pub fn classify(data: Bytes) -> Self {
        if is_rtcp(&data) {
            Datagram::Rtcp(data)
        } else {
            Datagram::Rtp(data)
        }
    }

    pub fn as_bytes(&self) -> &Bytes {
        match self {
            Datagram::Rtp(data) | Datagram::Rtcp(data) => data,
        }
    }

    pub fn is_rtcp(&self) -> bool {
        matches!(self, Datagram::Rtcp(_))
    }
}

/// Trait for RTP transport implementations
#[async_trait]
pub trait RtpTransport: Send + Sync {
    /// Local address the transport is bound to
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Send serialized RTP bytes to the remote peer
    async fn send_rtp(&self, data: Bytes) -> Result<()>;

    /// Send a serialized RTCP compound packet to the remote peer
    async fn send_rtcp(&self, data: Bytes) -> Result<()>;

    /// Wait for the next datagram.
    ///
    /// Returns `Error::TransportClosed` once the transport has been closed.
    async fn recv(&self) -> Result<Datagram>;

    /// Close the transport, waking any pending `recv`
    async fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// RTP transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtpTransportConfig {
    /// Local address for the multiplexed RTP/RTCP flow
    pub local_addr: SocketAddr,

    /// Remote address, if known from signaling
    pub remote_addr: Option<SocketAddr>,

    /// Latch onto the source of the first received datagram
    pub symmetric_rtp: bool,
}

impl Default for RtpTransportConfig {
    fn default() -> Self {
        Self {
            local_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            remote_addr: None,
            symmetric_rtp: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtcp_mux_demux() {
        // SR, RR, RTPFB, PSFB and legacy FIR
        for pt in [200u8, 201, 205, 206, 192, 223] {
            assert!(is_rtcp(&[0x80, pt, 0, 1]), "pt {}", pt);
        }
        // RTP payload types 96 and 0, with and without marker
        for second in [96u8, 0x80 | 96, 0, 0x80] {
            assert!(!is_rtcp(&[0x80, second, 0, 1]), "byte {}", second);
        }
        assert!(!is_rtcp(&[0x80]));

        let datagram = Datagram::classify(Bytes::from_static(&[0x81, 201, 0, 1]));
        assert!(datagram.is_rtcp());
        assert_eq!(datagram.as_bytes().len(), 4);
    }
}

//! RTP/RTCP transport session for the MCU
//!
//! This crate turns an unreliable, unordered datagram stream into a timely,
//! loss-aware media flow for a single participant's media line, in both
//! directions.
//!
//! The library is organized into several modules:
//!
//! - `packet`: RTP packets, header extensions and the RTCP codec
//! - `buffer`: receive-side jitter buffer and send-side retransmission cache
//! - `stats`: loss window / NACK generation and round-trip-time estimation
//! - `session`: the session gluing send and receive pipelines together
//! - `transport`: datagram transport abstraction and the UDP implementation
//! - `security`: opaque SRTP protect/unprotect hook
//! - `congestion`: congestion controller contract
//! - `time`: timing and clock utilities

mod error;

pub mod buffer;
pub mod congestion;
pub mod packet;
pub mod security;
pub mod session;
pub mod stats;
pub mod time;
pub mod transport;

// Re-export core types
pub use error::{EncodeError, Error, ParseError};

pub use packet::{
    CodecId, ExtensionMap, ExtensionType, HeaderExtensions, MediaKind, RtpHeader, RtpPacket,
};
pub use packet::rtcp::{
    NtpTimestamp, RtcpCompoundPacket, RtcpPacket, RtcpPacketType, RtcpReportBlock,
};

pub use buffer::jitter::{JitterBuffer, JitterBufferConfig, JitterBufferStats};
pub use buffer::retransmission::{Resend, RetransmissionCache, RtxConfig};
pub use congestion::{CongestionController, FixedBitrate};
pub use security::{PassthroughContext, SrtpContext};
pub use session::{
    FullRefreshMode, MediaStatistics, RtpMap, RtpSession, SessionConfig, SessionListener,
};
pub use stats::loss::LossTracker;
pub use stats::rtt::RttEstimator;
pub use transport::{
    Datagram, MemoryTransport, RtpTransport, RtpTransportConfig, UdpRtpTransport,
};

/// The default maximum size for RTP packets in bytes
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1500;

/// Typedef for RTP timestamp values
pub type RtpTimestamp = u32;

/// Typedef for RTP sequence numbers
pub type RtpSequenceNumber = u16;

/// Typedef for RTP synchronization source identifier
pub type RtpSsrc = u32;

/// Typedef for RTP contributing source identifier
pub type RtpCsrc = u32;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::{
        CodecId, Error, MediaKind, Result, RtpHeader, RtpMap, RtpPacket, RtpSequenceNumber,
        RtpSession, RtpSsrc, RtpTimestamp, SessionConfig, SessionListener,
    };

    pub use crate::packet::rtcp::{RtcpCompoundPacket, RtcpPacket, RtcpReportBlock};
}

#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

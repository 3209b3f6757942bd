//! Send-side retransmission cache
//!
//! Keeps recently sent packets keyed by extended sequence number so NACKed
//! packets can be sent again, either as plain duplicates or wrapped in the
//! RTX payload format (RFC 4588) on a separate SSRC.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::trace;

use crate::packet::RtpPacket;
use crate::{RtpSequenceNumber, RtpSsrc};

/// Packets are always kept at least this long
pub const MIN_RETENTION: Duration = Duration::from_millis(300);

/// Retention before adding twice the round trip time
const RETENTION_BASE: Duration = Duration::from_millis(200);

/// Retransmission stream settings negotiated for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtxConfig {
    /// SSRC of the RTX stream, random when unset
    pub ssrc: Option<RtpSsrc>,
}

/// Outcome of a resend lookup
#[derive(Debug, Clone)]
pub enum Resend {
    /// Packet ready to be written again
    Packet(RtpPacket),
    /// Evicted or never sent
    Miss,
}

impl Resend {
    pub fn is_miss(&self) -> bool {
        matches!(self, Resend::Miss)
    }

    pub fn into_packet(self) -> Option<RtpPacket> {
        match self {
            Resend::Packet(packet) => Some(packet),
            Resend::Miss => None,
        }
    }
}

/// RTX stream state: its SSRC and its own sequence counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RtxStream {
    ssrc: RtpSsrc,
    next_seq: RtpSequenceNumber,
}

/// Time-bounded store of sent packets
#[derive(Debug, Default)]
pub struct RetransmissionCache {
    entries: BTreeMap<u32, RtpPacket>,
    rtt: Duration,
    rtx: Option<RtxStream>,
}

impl RetransmissionCache {
    /// Cache that resends plain duplicates
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that wraps resent packets as RTX on `ssrc`, numbering from `initial_seq`
    pub fn with_rtx(ssrc: RtpSsrc, initial_seq: RtpSequenceNumber) -> Self {
        Self {
            rtx: Some(RtxStream {
                ssrc,
                next_seq: initial_seq,
            }),
            ..Self::default()
        }
    }

    pub fn rtx_ssrc(&self) -> Option<RtpSsrc> {
        self.rtx.map(|rtx| rtx.ssrc)
    }

    /// Update the round trip time driving the retention window
    pub fn set_rtt(&mut self, rtt: Duration) {
        self.rtt = rtt;
    }

    /// How long packets are kept: `max(300ms, 200ms + 2 * rtt)`
    pub fn retention(&self) -> Duration {
        MIN_RETENTION.max(RETENTION_BASE + self.rtt * 2)
    }

    /// Store a copy of a sent packet, evicting expired entries first
    pub fn retain(&mut self, packet: RtpPacket) {
        let now = packet.send_time.unwrap_or_else(Instant::now);
        self.evict(now);
        self.entries.insert(packet.extended_seq, packet);
    }

    /// Remove entries sent more than one retention window before `now`
    pub fn evict(&mut self, now: Instant) {
        let retention = self.retention();
        while let Some(entry) = self.entries.first_entry() {
            let sent = entry.get().send_time.unwrap_or(now);
            if now.saturating_duration_since(sent) <= retention {
                break;
            }
            trace!("Evicting packet {} from retransmission cache", entry.key());
            entry.remove();
        }
    }

    pub fn contains(&self, ext_seq: u32) -> bool {
        self.entries.contains_key(&ext_seq)
    }

    /// Cached original for `ext_seq`, ignoring age
    pub fn get(&self, ext_seq: u32) -> Option<&RtpPacket> {
        self.entries.get(&ext_seq)
    }

    /// Packet to send again for `ext_seq`.
    ///
    /// With RTX configured and a negotiated RTX payload type the packet is
    /// wrapped and takes the next RTX sequence number.
    pub fn resend(&mut self, ext_seq: u32, rtx_payload_type: Option<u8>) -> Resend {
        self.evict(Instant::now());
        let Some(original) = self.entries.get(&ext_seq) else {
            trace!("Retransmission cache miss for {}", ext_seq);
            return Resend::Miss;
        };

        match (self.rtx.as_mut(), rtx_payload_type) {
            (Some(rtx), Some(payload_type)) => {
                let packet = original.to_rtx(rtx.ssrc, payload_type, rtx.next_seq);
                rtx.next_seq = rtx.next_seq.wrapping_add(1);
                Resend::Packet(packet)
            }
            _ => Resend::Packet(original.clone()),
        }
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn sent_packet(seq: u32) -> RtpPacket {
        let mut packet =
            RtpPacket::new_with_payload(96, seq as u16, seq * 3000, 0xAAAA, Bytes::from_static(b"video"));
        packet.extended_seq = seq;
        packet.send_time = Some(Instant::now());
        packet
    }

    #[tokio::test(start_paused = true)]
    async fn test_resend_plain_duplicate() {
        let mut cache = RetransmissionCache::new();
        cache.retain(sent_packet(10));

        let resent = cache.resend(10, Some(97)).into_packet().unwrap();
        assert_eq!(resent.ssrc(), 0xAAAA);
        assert_eq!(resent.sequence_number(), 10);
        assert_eq!(resent.payload_type(), 96);
        assert!(cache.resend(11, None).is_miss());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resend_as_rtx() {
        let mut cache = RetransmissionCache::with_rtx(0xBBBB, 500);
        cache.retain(sent_packet(10));
        cache.retain(sent_packet(11));

        let first = cache.resend(11, Some(97)).into_packet().unwrap();
        let second = cache.resend(10, Some(97)).into_packet().unwrap();

        assert_eq!(first.ssrc(), 0xBBBB);
        assert_eq!(first.payload_type(), 97);
        assert_eq!(first.sequence_number(), 500);
        assert_eq!(&first.payload[..2], &[0, 11]);
        assert_eq!(second.sequence_number(), 501);

        // Without a negotiated RTX payload type fall back to duplicates
        assert_eq!(cache.resend(10, None).into_packet().unwrap().ssrc(), 0xAAAA);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_by_age() {
        let mut cache = RetransmissionCache::new();
        cache.retain(sent_packet(1));
        tokio::time::advance(Duration::from_millis(200)).await;
        cache.retain(sent_packet(2));
        tokio::time::advance(Duration::from_millis(150)).await;
        cache.retain(sent_packet(3));

        // Packet 1 is 350ms old, past the 300ms floor
        assert!(!cache.contains(1));
        assert!(cache.contains(2));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retention_grows_with_rtt() {
        let mut cache = RetransmissionCache::new();
        assert_eq!(cache.retention(), Duration::from_millis(300));

        cache.set_rtt(Duration::from_millis(150));
        assert_eq!(cache.retention(), Duration::from_millis(500));

        cache.retain(sent_packet(1));
        tokio::time::advance(Duration::from_millis(400)).await;
        cache.retain(sent_packet(2));
        assert!(cache.contains(1));
        assert!(!cache.resend(1, None).is_miss());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear() {
        let mut cache = RetransmissionCache::new();
        cache.retain(sent_packet(1));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.resend(1, None).is_miss());
    }
}

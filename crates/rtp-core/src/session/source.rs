//! Per-SSRC stream bookkeeping
//!
//! An `OutgoingSource` numbers what we send; an `IncomingSource` extends what
//! we receive, estimates interarrival jitter and builds the report block we
//! send back about it (RFC 3550 Appendix A.1, A.3 and A.8).

use std::time::Duration;

use tokio::time::Instant;

use crate::packet::rtcp::RtcpReportBlock;
use crate::packet::RtpPacket;
use crate::time::{duration_to_dlsr, duration_to_rtp_timestamp};
use crate::{RtpSequenceNumber, RtpSsrc, RtpTimestamp};

/// Wire sequence numbers below this count as "just wrapped"
const WRAP_LOW: RtpSequenceNumber = 0x1000;

/// Wire sequence numbers above this count as "about to wrap"
const WRAP_HIGH: RtpSequenceNumber = 0xF000;

/// Largest value of the 24-bit cumulative loss field
const MAX_CUMULATIVE_LOST: u64 = 0x00FF_FFFF;

/// Send-side source: SSRC, sequence counter and sender report counters
#[derive(Debug, Clone)]
pub struct OutgoingSource {
    pub ssrc: RtpSsrc,
    next_seq: RtpSequenceNumber,
    cycles: u16,
    /// Extended sequence number of the last stamped packet
    last_extended: Option<u32>,
    pub packets: u32,
    pub octets: u32,
    last_timestamp: RtpTimestamp,
    last_sent: Option<Instant>,
}

impl OutgoingSource {
    pub fn new(ssrc: RtpSsrc, initial_seq: RtpSequenceNumber) -> Self {
        Self {
            ssrc,
            next_seq: initial_seq,
            cycles: 0,
            last_extended: None,
            packets: 0,
            octets: 0,
            last_timestamp: 0,
            last_sent: None,
        }
    }

    /// Take the next wire sequence number and its extended form
    pub fn next_sequence(&mut self) -> (RtpSequenceNumber, u32) {
        let seq = self.next_seq;
        let extended = (self.cycles as u32) << 16 | seq as u32;

        self.next_seq = seq.wrapping_add(1);
        if self.next_seq == 0 {
            self.cycles = self.cycles.wrapping_add(1);
        }
        self.last_extended = Some(extended);

        (seq, extended)
    }

    /// Extend a sequence number echoed back by the peer (e.g. in a NACK)
    pub fn extend(&self, seq: RtpSequenceNumber) -> u32 {
        let candidate = (self.cycles as u32) << 16 | seq as u32;
        match self.last_extended {
            Some(last) if candidate > last && self.cycles > 0 => {
                ((self.cycles - 1) as u32) << 16 | seq as u32
            }
            _ => candidate,
        }
    }

    /// Account for a packet handed to the transport
    pub fn on_sent(&mut self, payload_len: usize, timestamp: RtpTimestamp, now: Instant) {
        self.packets = self.packets.wrapping_add(1);
        self.octets = self.octets.wrapping_add(payload_len as u32);
        self.last_timestamp = timestamp;
        self.last_sent = Some(now);
    }

    /// RTP timestamp corresponding to `now`, extrapolated from the last send
    pub fn rtp_timestamp_at(&self, now: Instant, clock_rate: u32) -> RtpTimestamp {
        match self.last_sent {
            Some(sent) => self.last_timestamp.wrapping_add(duration_to_rtp_timestamp(
                now.saturating_duration_since(sent),
                clock_rate,
            )),
            None => self.last_timestamp,
        }
    }
}

/// Receive-side source state for one remote SSRC
#[derive(Debug, Clone, Default)]
pub struct IncomingSource {
    ssrc: Option<RtpSsrc>,
    cycles: u16,
    max_seq: Option<RtpSequenceNumber>,
    base_extended: u32,
    highest_extended: u32,
    pub received: u32,
    pub octets: u64,

    expected_prior: u32,
    received_prior: u32,

    /// Interarrival jitter in timestamp units, scaled by 16
    jitter: u32,
    last_transit: Option<u32>,
    epoch: Option<Instant>,

    /// Middle NTP bits of the last SR from this source and when it arrived
    last_sr: Option<(u32, Instant)>,
}

impl IncomingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ssrc(&self) -> Option<RtpSsrc> {
        self.ssrc
    }

    /// Forget everything and start tracking `ssrc`
    pub fn reset(&mut self, ssrc: RtpSsrc) {
        *self = Self {
            ssrc: Some(ssrc),
            ..Self::default()
        };
    }

    pub fn cycles(&self) -> u16 {
        self.cycles
    }

    /// Extend a received wire sequence number, counting wraps.
    ///
    /// A late packet from before the last wrap keeps the previous cycle.
    pub fn extend(&mut self, seq: RtpSequenceNumber) -> u32 {
        let extended = match self.max_seq {
            None => {
                self.max_seq = Some(seq);
                self.base_extended = seq as u32;
                self.highest_extended = seq as u32;
                return seq as u32;
            }
            Some(max) if seq < WRAP_LOW && max > WRAP_HIGH => {
                self.cycles = self.cycles.wrapping_add(1);
                self.max_seq = Some(seq);
                (self.cycles as u32) << 16 | seq as u32
            }
            Some(max) if seq > WRAP_HIGH && max < WRAP_LOW && self.cycles > 0 => {
                ((self.cycles - 1) as u32) << 16 | seq as u32
            }
            Some(max) => {
                if seq > max {
                    self.max_seq = Some(seq);
                }
                (self.cycles as u32) << 16 | seq as u32
            }
        };

        self.highest_extended = self.highest_extended.max(extended);
        extended
    }

    /// Account for a received packet, returning its extended sequence number.
    ///
    /// Retransmissions skip the jitter estimate, their arrival time says
    /// nothing about the network path of the original.
    pub fn update(
        &mut self,
        packet: &RtpPacket,
        now: Instant,
        clock_rate: u32,
        retransmission: bool,
    ) -> u32 {
        let extended = self.extend(packet.sequence_number());
        self.received = self.received.wrapping_add(1);
        self.octets += packet.payload.len() as u64;

        if !retransmission {
            self.update_jitter(packet.timestamp(), now, clock_rate);
        }

        extended
    }

    fn update_jitter(&mut self, timestamp: RtpTimestamp, now: Instant, clock_rate: u32) {
        let epoch = *self.epoch.get_or_insert(now);
        let arrival = duration_to_rtp_timestamp(now.saturating_duration_since(epoch), clock_rate);
        let transit = arrival.wrapping_sub(timestamp);

        if let Some(last) = self.last_transit {
            let d = (transit.wrapping_sub(last) as i32).unsigned_abs();
            // J += (|D| - J) / 16, kept scaled by 16
            self.jitter = self
                .jitter
                .wrapping_add(d)
                .wrapping_sub((self.jitter + 8) >> 4);
        }
        self.last_transit = Some(transit);
    }

    /// Interarrival jitter in timestamp units
    pub fn jitter(&self) -> u32 {
        self.jitter >> 4
    }

    /// Packets expected from the sequence numbers seen so far
    pub fn expected(&self) -> u32 {
        match self.max_seq {
            Some(_) => self.highest_extended - self.base_extended + 1,
            None => 0,
        }
    }

    /// Cumulative packets lost, clamped at zero
    pub fn lost(&self) -> u32 {
        self.expected().saturating_sub(self.received)
    }

    /// Remember an SR from this source for the LSR/DLSR echo
    pub fn on_sender_report(&mut self, ntp_middle: u32, now: Instant) {
        self.last_sr = Some((ntp_middle, now));
    }

    /// Build the report block for this source and start a new interval
    pub fn report_block(&mut self, now: Instant) -> Option<RtcpReportBlock> {
        let ssrc = self.ssrc?;
        let expected = self.expected();

        let expected_interval = expected.wrapping_sub(self.expected_prior);
        let received_interval = self.received.wrapping_sub(self.received_prior);
        self.expected_prior = expected;
        self.received_prior = self.received;

        let lost_interval = expected_interval as i64 - received_interval as i64;
        let fraction_lost = if expected_interval == 0 || lost_interval <= 0 {
            0
        } else {
            ((lost_interval << 8) / expected_interval as i64).min(255) as u8
        };

        let (last_sr, delay_since_last_sr) = match self.last_sr {
            Some((ntp, at)) => (ntp, duration_to_dlsr(now.saturating_duration_since(at))),
            None => (0, 0),
        };

        Some(RtcpReportBlock {
            ssrc,
            fraction_lost,
            cumulative_lost: (self.lost() as u64).min(MAX_CUMULATIVE_LOST) as u32,
            highest_seq: self.highest_extended,
            jitter: self.jitter(),
            last_sr,
            delay_since_last_sr,
        })
    }

    /// Time since the last SR, if one arrived
    pub fn since_last_sr(&self, now: Instant) -> Option<Duration> {
        self.last_sr
            .map(|(_, at)| now.saturating_duration_since(at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use proptest::prelude::*;

    fn packet(seq: u16, timestamp: u32) -> RtpPacket {
        RtpPacket::new_with_payload(96, seq, timestamp, 0x1234, Bytes::from_static(b"abcd"))
    }

    #[test]
    fn test_outgoing_wraps() {
        let mut source = OutgoingSource::new(1, 65534);
        assert_eq!(source.next_sequence(), (65534, 65534));
        assert_eq!(source.next_sequence(), (65535, 65535));
        assert_eq!(source.next_sequence(), (0, 65536));
        assert_eq!(source.next_sequence(), (1, 65537));

        // Echoed numbers map back to the cycle they were sent in
        assert_eq!(source.extend(1), 65537);
        assert_eq!(source.extend(65535), 65535);
    }

    #[test]
    fn test_incoming_wraps_once() {
        let mut source = IncomingSource::new();
        source.reset(0x1234);
        let extended: Vec<u32> = [65534u16, 65535, 0, 1]
            .iter()
            .map(|seq| source.extend(*seq))
            .collect();
        assert_eq!(extended, vec![65534, 65535, 65536, 65537]);
        assert_eq!(source.cycles(), 1);

        // Late packet from before the wrap
        assert_eq!(source.extend(65533), 65533);
        assert_eq!(source.cycles(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_block_loss() {
        let mut source = IncomingSource::new();
        source.reset(0x1234);
        let now = Instant::now();

        for seq in [10u16, 11, 13, 14] {
            source.update(&packet(seq, seq as u32 * 160), now, 8000, false);
        }

        let block = source.report_block(now).unwrap();
        assert_eq!(block.ssrc, 0x1234);
        assert_eq!(block.highest_seq, 14);
        assert_eq!(block.cumulative_lost, 1);
        // 1 of 5 lost
        assert_eq!(block.fraction_lost, 51);
        assert_eq!(block.last_sr, 0);

        // Nothing new, nothing lost in this interval
        let block = source.report_block(now).unwrap();
        assert_eq!(block.fraction_lost, 0);
        assert_eq!(block.cumulative_lost, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_block_echoes_sr() {
        let mut source = IncomingSource::new();
        source.reset(7);
        source.on_sender_report(0xABCD_0000, Instant::now());
        tokio::time::advance(Duration::from_millis(500)).await;

        let block = source.report_block(Instant::now()).unwrap();
        assert_eq!(block.last_sr, 0xABCD_0000);
        assert_eq!(block.delay_since_last_sr, 32768);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_zero_for_regular_arrivals() {
        let mut source = IncomingSource::new();
        source.reset(7);
        for i in 0..50u16 {
            source.update(&packet(i, i as u32 * 160), Instant::now(), 8000, false);
            tokio::time::advance(Duration::from_millis(20)).await;
        }
        assert_eq!(source.jitter(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_grows_with_variation() {
        let mut source = IncomingSource::new();
        source.reset(7);
        for i in 0..50u16 {
            source.update(&packet(i, i as u32 * 160), Instant::now(), 8000, false);
            let step = if i % 2 == 0 { 10 } else { 30 };
            tokio::time::advance(Duration::from_millis(step)).await;
        }
        // Alternating +-10ms around 20ms spacing, 80 timestamp units
        assert!(source.jitter() > 40, "jitter {}", source.jitter());
    }

    #[test]
    fn test_report_block_requires_ssrc() {
        let mut source = IncomingSource::new();
        assert!(source.report_block(Instant::now()).is_none());
    }

    proptest! {
        #[test]
        fn prop_extension_counts_wraps(start in any::<u16>(), count in 1usize..3000) {
            let mut source = IncomingSource::new();
            source.reset(1);
            let mut seq = start;
            let mut expected = start as u32;
            for _ in 0..count {
                prop_assert_eq!(source.extend(seq), expected);
                seq = seq.wrapping_add(37);
                expected += 37;
            }
        }
    }
}

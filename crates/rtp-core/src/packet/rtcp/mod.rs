//! RTCP packet module
//!
//! Codec for RTCP compound packets (RFC 3550) and the AVPF feedback messages
//! (RFC 4585, RFC 5104) the session reacts to.

mod app;
mod bye;
mod feedback;
mod legacy;
mod ntp;
mod payload_feedback;
mod receiver_report;
mod report_block;
mod sdes;
mod sender_report;

pub use app::RtcpApplicationDefined;
pub use bye::RtcpGoodbye;
pub use feedback::{
    NackField, RtcpRtpFeedback, RtpFeedbackFci, TmmbItem, RTPFB_NACK, RTPFB_TMMBN, RTPFB_TMMBR,
    RTPFB_TRANSPORT_WIDE,
};
pub use legacy::{RtcpLegacyFir, RtcpLegacyNack};
pub use ntp::NtpTimestamp;
pub use payload_feedback::{
    FirEntry, PayloadFeedbackFci, Remb, RtcpPayloadFeedback, PSFB_ALF, PSFB_FIR, PSFB_PLI,
};
pub use receiver_report::RtcpReceiverReport;
pub use report_block::RtcpReportBlock;
pub use sdes::{RtcpSdesChunk, RtcpSdesItem, RtcpSourceDescription, SDES_CNAME};
pub use sender_report::RtcpSenderReport;

use bytes::{Buf, BufMut, Bytes};
use tracing::trace;

use super::{ensure_capacity, ensure_remaining};
use crate::error::{EncodeError, ParseError};

/// RTCP protocol version (same as RTP)
pub const RTCP_VERSION: u8 = 2;

/// Size of the common header
pub const RTCP_HEADER_SIZE: usize = 4;

/// RTCP packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RtcpPacketType {
    /// Full Intra Request, RFC 2032 (192)
    FullIntraRequest = 192,

    /// NACK, RFC 2032 (193)
    Nack = 193,

    /// Sender Report (200)
    SenderReport = 200,

    /// Receiver Report (201)
    ReceiverReport = 201,

    /// Source Description (202)
    SourceDescription = 202,

    /// Goodbye (203)
    Goodbye = 203,

    /// Application-Defined (204)
    ApplicationDefined = 204,

    /// Transport layer feedback (205)
    RtpFeedback = 205,

    /// Payload-specific feedback (206)
    PayloadFeedback = 206,
}

impl TryFrom<u8> for RtcpPacketType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            192 => Ok(RtcpPacketType::FullIntraRequest),
            193 => Ok(RtcpPacketType::Nack),
            200 => Ok(RtcpPacketType::SenderReport),
            201 => Ok(RtcpPacketType::ReceiverReport),
            202 => Ok(RtcpPacketType::SourceDescription),
            203 => Ok(RtcpPacketType::Goodbye),
            204 => Ok(RtcpPacketType::ApplicationDefined),
            205 => Ok(RtcpPacketType::RtpFeedback),
            206 => Ok(RtcpPacketType::PayloadFeedback),
            other => Err(other),
        }
    }
}

/// One sub-packet of a compound packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtcpPacket {
    SenderReport(RtcpSenderReport),
    ReceiverReport(RtcpReceiverReport),
    SourceDescription(RtcpSourceDescription),
    Goodbye(RtcpGoodbye),
    ApplicationDefined(RtcpApplicationDefined),
    RtpFeedback(RtcpRtpFeedback),
    PayloadFeedback(RtcpPayloadFeedback),
    LegacyFir(RtcpLegacyFir),
    LegacyNack(RtcpLegacyNack),
}

impl RtcpPacket {
    pub fn packet_type(&self) -> RtcpPacketType {
        match self {
            RtcpPacket::SenderReport(_) => RtcpPacketType::SenderReport,
            RtcpPacket::ReceiverReport(_) => RtcpPacketType::ReceiverReport,
            RtcpPacket::SourceDescription(_) => RtcpPacketType::SourceDescription,
            RtcpPacket::Goodbye(_) => RtcpPacketType::Goodbye,
            RtcpPacket::ApplicationDefined(_) => RtcpPacketType::ApplicationDefined,
            RtcpPacket::RtpFeedback(_) => RtcpPacketType::RtpFeedback,
            RtcpPacket::PayloadFeedback(_) => RtcpPacketType::PayloadFeedback,
            RtcpPacket::LegacyFir(_) => RtcpPacketType::FullIntraRequest,
            RtcpPacket::LegacyNack(_) => RtcpPacketType::Nack,
        }
    }

    /// Value of the 5-bit count/format field
    fn count(&self) -> u8 {
        match self {
            RtcpPacket::SenderReport(p) => p.count(),
            RtcpPacket::ReceiverReport(p) => p.count(),
            RtcpPacket::SourceDescription(p) => p.count(),
            RtcpPacket::Goodbye(p) => p.count(),
            RtcpPacket::ApplicationDefined(p) => p.count(),
            RtcpPacket::RtpFeedback(p) => p.fmt(),
            RtcpPacket::PayloadFeedback(p) => p.fmt(),
            RtcpPacket::LegacyFir(_) | RtcpPacket::LegacyNack(_) => 0,
        }
    }

    fn body_size(&self) -> usize {
        match self {
            RtcpPacket::SenderReport(p) => p.body_size(),
            RtcpPacket::ReceiverReport(p) => p.body_size(),
            RtcpPacket::SourceDescription(p) => p.body_size(),
            RtcpPacket::Goodbye(p) => p.body_size(),
            RtcpPacket::ApplicationDefined(p) => p.body_size(),
            RtcpPacket::RtpFeedback(p) => p.body_size(),
            RtcpPacket::PayloadFeedback(p) => p.body_size(),
            RtcpPacket::LegacyFir(p) => p.body_size(),
            RtcpPacket::LegacyNack(p) => p.body_size(),
        }
    }

    /// Serialized size including the common header
    pub fn size(&self) -> usize {
        RTCP_HEADER_SIZE + self.body_size()
    }

    /// Parse one sub-packet body given its already decoded header fields
    fn parse_body(packet_type: RtcpPacketType, count: u8, body: &[u8]) -> Result<Self, ParseError> {
        Ok(match packet_type {
            RtcpPacketType::SenderReport => {
                RtcpPacket::SenderReport(RtcpSenderReport::parse(count, body)?)
            }
            RtcpPacketType::ReceiverReport => {
                RtcpPacket::ReceiverReport(RtcpReceiverReport::parse(count, body)?)
            }
            RtcpPacketType::SourceDescription => {
                RtcpPacket::SourceDescription(RtcpSourceDescription::parse(count, body)?)
            }
            RtcpPacketType::Goodbye => RtcpPacket::Goodbye(RtcpGoodbye::parse(count, body)?),
            RtcpPacketType::ApplicationDefined => {
                RtcpPacket::ApplicationDefined(RtcpApplicationDefined::parse(count, body)?)
            }
            RtcpPacketType::RtpFeedback => {
                RtcpPacket::RtpFeedback(RtcpRtpFeedback::parse(count, body)?)
            }
            RtcpPacketType::PayloadFeedback => {
                RtcpPacket::PayloadFeedback(RtcpPayloadFeedback::parse(count, body)?)
            }
            RtcpPacketType::FullIntraRequest => RtcpPacket::LegacyFir(RtcpLegacyFir::parse(body)?),
            RtcpPacketType::Nack => RtcpPacket::LegacyNack(RtcpLegacyNack::parse(body)?),
        })
    }

    /// Write header and body
    pub fn serialize(&self, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        self.write(buf, 0)
    }

    /// Write header, body and `padding` trailing bytes, setting the P bit when non-zero
    fn write(&self, buf: &mut impl BufMut, padding: u8) -> Result<(), EncodeError> {
        if padding % 4 != 0 {
            return Err(EncodeError::InvalidParameter(format!(
                "RTCP padding of {} bytes is not 32-bit aligned",
                padding
            )));
        }
        let body_size = self.body_size() + padding as usize;
        if body_size % 4 != 0 {
            return Err(EncodeError::InvalidParameter(format!(
                "{:?} body of {} bytes is not 32-bit aligned",
                self.packet_type(),
                body_size
            )));
        }
        let words = (RTCP_HEADER_SIZE + body_size) / 4 - 1;
        if words > u16::MAX as usize {
            return Err(EncodeError::InvalidParameter(format!(
                "{:?} of {} bytes exceeds the length field",
                self.packet_type(),
                body_size
            )));
        }

        let padding_bit = if padding > 0 { 0x20 } else { 0 };
        buf.put_u8(RTCP_VERSION << 6 | padding_bit | (self.count() & 0x1F));
        buf.put_u8(self.packet_type() as u8);
        buf.put_u16(words as u16);

        match self {
            RtcpPacket::SenderReport(p) => p.write_body(buf)?,
            RtcpPacket::ReceiverReport(p) => p.write_body(buf)?,
            RtcpPacket::SourceDescription(p) => p.write_body(buf)?,
            RtcpPacket::Goodbye(p) => p.write_body(buf)?,
            RtcpPacket::ApplicationDefined(p) => p.write_body(buf)?,
            RtcpPacket::RtpFeedback(p) => p.write_body(buf)?,
            RtcpPacket::PayloadFeedback(p) => p.write_body(buf)?,
            RtcpPacket::LegacyFir(p) => p.write_body(buf)?,
            RtcpPacket::LegacyNack(p) => p.write_body(buf)?,
        }

        if padding > 0 {
            buf.put_bytes(0, padding as usize - 1);
            buf.put_u8(padding);
        }
        Ok(())
    }
}

/// Sequence of RTCP sub-packets sharing one datagram
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtcpCompoundPacket {
    pub packets: Vec<RtcpPacket>,
    /// Padding bytes after the last sub-packet, pad count included
    pub padding: u8,
}

impl RtcpCompoundPacket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_packets(packets: Vec<RtcpPacket>) -> Self {
        Self { packets, padding: 0 }
    }

    pub fn push(&mut self, packet: RtcpPacket) {
        self.packets.push(packet);
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Serialized size of all sub-packets and the trailing padding
    pub fn size(&self) -> usize {
        let padding = if self.packets.is_empty() { 0 } else { self.padding as usize };
        self.packets.iter().map(RtcpPacket::size).sum::<usize>() + padding
    }

    /// Parse every sub-packet until the datagram is consumed.
    ///
    /// Sub-packets of unknown type are skipped using their length field.
    /// Only the last sub-packet may carry padding (RFC 3550 A.2).
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut buf = data;
        ensure_remaining(&buf, RTCP_HEADER_SIZE)?;

        let mut packets = Vec::new();
        let mut trailing_padding = 0u8;
        while buf.has_remaining() {
            if buf.remaining() < RTCP_HEADER_SIZE {
                return Err(ParseError::InvalidLength {
                    declared: RTCP_HEADER_SIZE,
                    available: buf.remaining(),
                });
            }

            let first = buf[0];
            let version = first >> 6;
            if version != RTCP_VERSION {
                return Err(ParseError::InvalidVersion(version));
            }
            let padding = first & 0x20 != 0;
            let count = first & 0x1F;
            let packet_type = buf[1];
            let total = (u16::from_be_bytes([buf[2], buf[3]]) as usize + 1) * 4;

            if total > buf.remaining() {
                return Err(ParseError::InvalidLength {
                    declared: total,
                    available: buf.remaining(),
                });
            }

            let mut body = &buf[RTCP_HEADER_SIZE..total];
            let mut pad = 0u8;
            if padding {
                if total < buf.remaining() {
                    return Err(ParseError::Malformed(
                        "RTCP padding before the last sub-packet".to_string(),
                    ));
                }
                pad = body.last().copied().unwrap_or(0);
                if pad == 0 || pad % 4 != 0 || pad as usize > body.len() {
                    return Err(ParseError::Malformed(format!(
                        "invalid RTCP padding {} for body of {} bytes",
                        pad,
                        body.len()
                    )));
                }
                body = &body[..body.len() - pad as usize];
            }

            match RtcpPacketType::try_from(packet_type) {
                Ok(known) => {
                    packets.push(RtcpPacket::parse_body(known, count, body)?);
                    trailing_padding = pad;
                }
                Err(unknown) => trace!("Skipping unknown RTCP packet type {} ({} bytes)", unknown, total),
            }

            buf.advance(total);
        }

        Ok(Self {
            packets,
            padding: trailing_padding,
        })
    }

    fn write_packets(&self, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        let last = self.packets.len().saturating_sub(1);
        for (i, packet) in self.packets.iter().enumerate() {
            let padding = if i == last { self.padding } else { 0 };
            packet.write(buf, padding)?;
        }
        Ok(())
    }

    /// Serialize into `buf`, returning the number of bytes written
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        let size = self.size();
        ensure_capacity(size, buf.len())?;

        let mut out = &mut buf[..size];
        self.write_packets(&mut out)?;
        Ok(size)
    }

    /// Serialize into a freshly allocated buffer
    pub fn to_bytes(&self) -> Result<Bytes, EncodeError> {
        let mut buf = Vec::with_capacity(self.size());
        self.write_packets(&mut buf)?;
        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_compound() -> Vec<u8> {
        let mut data = Vec::new();
        // SR with one report block
        data.extend_from_slice(&[0x81, 200, 0x00, 0x0C]);
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]); // ssrc
        data.extend_from_slice(&[0xE1, 0x2D, 0x44, 0x00, 0x80, 0x00, 0x00, 0x00]); // ntp
        data.extend_from_slice(&[0x00, 0x00, 0x0B, 0xB8]); // rtp ts
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x0A]); // packets
        data.extend_from_slice(&[0x00, 0x00, 0x03, 0xE8]); // octets
        data.extend_from_slice(&[
            0x00, 0x00, 0x00, 0x02, 0x10, 0x00, 0x00, 0x05, 0x00, 0x01, 0x00, 0x20, 0x00, 0x00,
            0x00, 0x10, 0x12, 0x34, 0x56, 0x78, 0x00, 0x01, 0x00, 0x00,
        ]);
        // SDES CNAME "abc"
        data.extend_from_slice(&[0x81, 202, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, 0x01, 0x03, b'a', b'b', b'c', 0, 0, 0]);
        // NACK {pid 50, blp 0}
        data.extend_from_slice(&[0x81, 205, 0x00, 0x03, 0, 0, 0, 1, 0, 0, 0, 2, 0x00, 0x32, 0x00, 0x00]);
        // TMMBN
        data.extend_from_slice(&[0x84, 205, 0x00, 0x04, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 2, 0x0C, 0x00, 0x02, 0x28]);
        // PLI
        data.extend_from_slice(&[0x81, 206, 0x00, 0x02, 0, 0, 0, 1, 0, 0, 0, 2]);
        // FIR
        data.extend_from_slice(&[0x84, 206, 0x00, 0x04, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 2, 9, 0, 0, 0]);
        // REMB
        data.extend_from_slice(&[
            0x8F, 206, 0x00, 0x05, 0, 0, 0, 1, 0, 0, 0, 0, b'R', b'E', b'M', b'B', 1, 0x0E, 0xDC, 0x6C, 0, 0, 0, 2,
        ]);
        // RR, BYE, APP, legacy FIR and NACK
        data.extend_from_slice(&[0x80, 201, 0x00, 0x01, 0, 0, 0, 1]);
        data.extend_from_slice(&[0x81, 203, 0x00, 0x01, 0, 0, 0, 1]);
        data.extend_from_slice(&[0x83, 204, 0x00, 0x03, 0, 0, 0, 1, b'T', b'E', b'S', b'T', 1, 2, 3, 4]);
        data.extend_from_slice(&[0x80, 192, 0x00, 0x01, 0, 0, 0, 2]);
        data.extend_from_slice(&[0x80, 193, 0x00, 0x02, 0, 0, 0, 2, 0x00, 0x10, 0x00, 0x01]);
        data
    }

    #[test]
    fn test_compound_round_trip_is_byte_exact() {
        let data = sample_compound();
        let compound = RtcpCompoundPacket::parse(&data).unwrap();
        assert_eq!(compound.packets.len(), 12);
        assert_eq!(compound.to_bytes().unwrap().as_ref(), &data[..]);

        let mut out = vec![0u8; data.len()];
        assert_eq!(compound.serialize(&mut out).unwrap(), data.len());
        assert_eq!(out, data);
    }

    #[test]
    fn test_parsed_fields() {
        let compound = RtcpCompoundPacket::parse(&sample_compound()).unwrap();

        match &compound.packets[0] {
            RtcpPacket::SenderReport(sr) => {
                assert_eq!(sr.ssrc, 1);
                assert_eq!(sr.rtp_timestamp, 3000);
                assert_eq!(sr.report_blocks[0].ssrc, 2);
                assert_eq!(sr.report_blocks[0].fraction_lost, 0x10);
                assert_eq!(sr.report_blocks[0].cumulative_lost, 5);
            }
            other => panic!("expected SR, got {:?}", other),
        }
        match &compound.packets[3] {
            RtcpPacket::RtpFeedback(fb) => match &fb.fci {
                RtpFeedbackFci::Tmmbn(items) => {
                    assert_eq!(items[0].ssrc, 2);
                    assert_eq!(items[0].exp, 3);
                    assert_eq!(items[0].mantissa, 1);
                    assert_eq!(items[0].overhead, 40);
                }
                other => panic!("expected TMMBN, got {:?}", other),
            },
            other => panic!("expected RTPFB, got {:?}", other),
        }
        match &compound.packets[6] {
            RtcpPacket::PayloadFeedback(fb) => match &fb.fci {
                PayloadFeedbackFci::ReceiverEstimatedMaxBitrate(remb) => {
                    assert_eq!(remb.exp, 3);
                    assert_eq!(remb.mantissa, 0x2DC6C);
                    assert_eq!(remb.bitrate(), 1_500_000);
                    assert_eq!(remb.ssrcs, vec![2]);
                }
                other => panic!("expected REMB, got {:?}", other),
            },
            other => panic!("expected PSFB, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_skipped() {
        let mut data = vec![0x80, 207, 0x00, 0x01, 0xDE, 0xAD, 0xBE, 0xEF];
        data.extend_from_slice(&[0x80, 192, 0x00, 0x01, 0, 0, 0, 2]);

        let compound = RtcpCompoundPacket::parse(&data).unwrap();
        assert_eq!(compound.packets, vec![RtcpPacket::LegacyFir(RtcpLegacyFir { ssrc: 2 })]);
    }

    #[test]
    fn test_length_exceeding_datagram() {
        let data = [0x80, 201, 0x00, 0x05, 0, 0, 0, 1];
        assert_eq!(
            RtcpCompoundPacket::parse(&data).unwrap_err(),
            ParseError::InvalidLength { declared: 24, available: 8 }
        );
    }

    #[test]
    fn test_trailing_garbage() {
        let data = [0x80, 201, 0x00, 0x01, 0, 0, 0, 1, 0x80];
        assert!(matches!(
            RtcpCompoundPacket::parse(&data),
            Err(ParseError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_padding_kept_for_serialize() {
        // RR with 4 bytes of padding
        let data = [0xA0, 201, 0x00, 0x02, 0, 0, 0, 1, 0, 0, 0, 4];
        let compound = RtcpCompoundPacket::parse(&data).unwrap();
        assert_eq!(
            compound.packets,
            vec![RtcpPacket::ReceiverReport(RtcpReceiverReport::new(1))]
        );
        assert_eq!(compound.padding, 4);
        assert_eq!(compound.size(), data.len());
        assert_eq!(compound.to_bytes().unwrap().as_ref(), &data[..]);
    }

    #[test]
    fn test_padding_only_on_last_sub_packet() {
        let mut data = vec![0xA0, 201, 0x00, 0x02, 0, 0, 0, 1, 0, 0, 0, 4];
        data.extend_from_slice(&[0x80, 192, 0x00, 0x01, 0, 0, 0, 2]);
        assert!(matches!(
            RtcpCompoundPacket::parse(&data),
            Err(ParseError::Malformed(_))
        ));

        // Pad count must keep the body aligned
        let data = [0xA0, 201, 0x00, 0x02, 0, 0, 0, 1, 0, 0, 0, 3];
        assert!(matches!(
            RtcpCompoundPacket::parse(&data),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_bad_version() {
        let data = [0x40, 201, 0x00, 0x01, 0, 0, 0, 1];
        assert_eq!(RtcpCompoundPacket::parse(&data).unwrap_err(), ParseError::InvalidVersion(1));
    }

    #[test]
    fn test_serialize_buffer_too_small() {
        let compound = RtcpCompoundPacket::with_packets(vec![RtcpPacket::ReceiverReport(
            RtcpReceiverReport::new(1),
        )]);
        let mut buf = [0u8; 4];
        assert_eq!(
            compound.serialize(&mut buf).unwrap_err(),
            EncodeError::BufferTooSmall { required: 8, available: 4 }
        );
    }

    fn report_block() -> impl Strategy<Value = RtcpReportBlock> {
        (any::<u32>(), any::<u8>(), 0u32..(1 << 24), any::<u32>(), any::<u32>(), any::<u32>(), any::<u32>())
            .prop_map(|(ssrc, fraction_lost, cumulative_lost, highest_seq, jitter, last_sr, dlsr)| {
                RtcpReportBlock {
                    ssrc,
                    fraction_lost,
                    cumulative_lost,
                    highest_seq,
                    jitter,
                    last_sr,
                    delay_since_last_sr: dlsr,
                }
            })
    }

    fn rtcp_packet() -> impl Strategy<Value = RtcpPacket> {
        prop_oneof![
            (any::<u32>(), any::<u64>(), any::<u32>(), proptest::collection::vec(report_block(), 0..4))
                .prop_map(|(ssrc, ntp, packets, blocks)| {
                    let mut sr = RtcpSenderReport::new(ssrc);
                    sr.ntp_timestamp = NtpTimestamp::from_u64(ntp);
                    sr.sender_packet_count = packets;
                    sr.report_blocks = blocks;
                    RtcpPacket::SenderReport(sr)
                }),
            (any::<u32>(), proptest::collection::vec(report_block(), 0..4)).prop_map(|(ssrc, blocks)| {
                let mut rr = RtcpReceiverReport::new(ssrc);
                rr.report_blocks = blocks;
                RtcpPacket::ReceiverReport(rr)
            }),
            (any::<u32>(), "[a-z0-9@.]{1,32}")
                .prop_map(|(ssrc, cname)| RtcpPacket::SourceDescription(
                    RtcpSourceDescription::with_cname(ssrc, &cname)
                )),
            (any::<u32>(), any::<u32>(), proptest::collection::vec((any::<u16>(), any::<u16>()), 1..5))
                .prop_map(|(sender, media, fields)| RtcpPacket::RtpFeedback(RtcpRtpFeedback::nack(
                    sender,
                    media,
                    fields.into_iter().map(|(pid, blp)| NackField::new(pid, blp)).collect(),
                ))),
            (any::<u32>(), any::<u32>(), 0u64..10_000_000_000, 0u16..0x200)
                .prop_map(|(sender, media, bitrate, overhead)| RtcpPacket::RtpFeedback(
                    RtcpRtpFeedback::tmmbn(sender, vec![TmmbItem::new(media, bitrate, overhead)])
                )),
            (any::<u32>(), any::<u32>()).prop_map(|(sender, media)| RtcpPacket::PayloadFeedback(
                RtcpPayloadFeedback::pli(sender, media)
            )),
            (any::<u32>(), any::<u32>(), any::<u8>()).prop_map(|(sender, media, seq)| RtcpPacket::PayloadFeedback(
                RtcpPayloadFeedback::fir(sender, media, seq)
            )),
            (any::<u32>(), 0u64..10_000_000_000, proptest::collection::vec(any::<u32>(), 1..4))
                .prop_map(|(sender, bitrate, ssrcs)| RtcpPacket::PayloadFeedback(
                    RtcpPayloadFeedback::remb(sender, Remb::new(bitrate, ssrcs))
                )),
            any::<u32>().prop_map(|ssrc| RtcpPacket::Goodbye(RtcpGoodbye::new(ssrc))),
        ]
    }

    proptest! {
        #[test]
        fn prop_compound_round_trip(
            packets in proptest::collection::vec(rtcp_packet(), 1..6),
            padding in prop_oneof![Just(0u8), (1u8..=63).prop_map(|words| words * 4)],
        ) {
            let mut compound = RtcpCompoundPacket::with_packets(packets);
            compound.padding = padding;
            let bytes = compound.to_bytes().unwrap();
            prop_assert_eq!(bytes.len(), compound.size());

            let parsed = RtcpCompoundPacket::parse(&bytes).unwrap();
            prop_assert_eq!(&parsed, &compound);
            prop_assert_eq!(parsed.to_bytes().unwrap(), bytes);
        }
    }
}

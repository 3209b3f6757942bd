use bytes::{Buf, BufMut, Bytes};

use super::ntp::NtpTimestamp;
use super::report_block::RtcpReportBlock;
use crate::error::{EncodeError, ParseError};
use crate::packet::ensure_remaining;
use crate::{RtpSsrc, RtpTimestamp};

/// Size of the sender info section following the SSRC
const SENDER_INFO_SIZE: usize = 20;

/// RTCP Sender Report (SR) packet
/// Defined in RFC 3550 Section 6.4.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpSenderReport {
    /// SSRC of the sender
    pub ssrc: RtpSsrc,

    /// NTP timestamp
    pub ntp_timestamp: NtpTimestamp,

    /// RTP timestamp corresponding to the NTP timestamp
    pub rtp_timestamp: RtpTimestamp,

    /// Sender's packet count
    pub sender_packet_count: u32,

    /// Sender's octet count
    pub sender_octet_count: u32,

    /// Report blocks
    pub report_blocks: Vec<RtcpReportBlock>,

    /// Profile-specific extension trailing the report blocks
    pub profile_extension: Bytes,
}

impl RtcpSenderReport {
    /// Create a new sender report
    pub fn new(ssrc: RtpSsrc) -> Self {
        Self {
            ssrc,
            ntp_timestamp: NtpTimestamp::default(),
            rtp_timestamp: 0,
            sender_packet_count: 0,
            sender_octet_count: 0,
            report_blocks: Vec::new(),
            profile_extension: Bytes::new(),
        }
    }

    pub(crate) fn parse(count: u8, mut body: &[u8]) -> Result<Self, ParseError> {
        ensure_remaining(&body, 4 + SENDER_INFO_SIZE)?;

        let ssrc = body.get_u32();
        let ntp_timestamp = NtpTimestamp::from_u64(body.get_u64());
        let rtp_timestamp = body.get_u32();
        let sender_packet_count = body.get_u32();
        let sender_octet_count = body.get_u32();

        let mut report_blocks = Vec::with_capacity(count as usize);
        for _ in 0..count {
            report_blocks.push(RtcpReportBlock::parse(&mut body)?);
        }

        Ok(Self {
            ssrc,
            ntp_timestamp,
            rtp_timestamp,
            sender_packet_count,
            sender_octet_count,
            report_blocks,
            profile_extension: Bytes::copy_from_slice(body),
        })
    }

    pub(crate) fn count(&self) -> u8 {
        self.report_blocks.len() as u8
    }

    pub(crate) fn body_size(&self) -> usize {
        4 + SENDER_INFO_SIZE
            + self.report_blocks.len() * RtcpReportBlock::SIZE
            + self.profile_extension.len()
    }

    pub(crate) fn write_body(&self, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        check_block_count(self.report_blocks.len())?;

        buf.put_u32(self.ssrc);
        buf.put_u64(self.ntp_timestamp.to_u64());
        buf.put_u32(self.rtp_timestamp);
        buf.put_u32(self.sender_packet_count);
        buf.put_u32(self.sender_octet_count);
        for block in &self.report_blocks {
            block.serialize(buf);
        }
        buf.put_slice(&self.profile_extension);
        Ok(())
    }
}

pub(crate) fn check_block_count(count: usize) -> Result<(), EncodeError> {
    if count > 31 {
        return Err(EncodeError::InvalidParameter(format!(
            "too many report blocks: {}",
            count
        )));
    }
    Ok(())
}

use bytes::{Buf, BufMut};

use crate::error::ParseError;
use crate::packet::ensure_remaining;
use crate::RtpSsrc;

/// Report block in RTCP SR/RR packets
/// Defined in RFC 3550 Section 6.4.1 and 6.4.2
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtcpReportBlock {
    /// SSRC identifier of the source this report is for
    pub ssrc: RtpSsrc,

    /// Fraction of packets lost since last report (fixed point /256)
    pub fraction_lost: u8,

    /// Cumulative number of packets lost (24 bits)
    pub cumulative_lost: u32,

    /// Extended highest sequence number received
    pub highest_seq: u32,

    /// Interarrival jitter estimate
    pub jitter: u32,

    /// Middle 32 bits of the last SR NTP timestamp from this source
    pub last_sr: u32,

    /// Delay since last SR from this source (in units of 1/65536 seconds)
    pub delay_since_last_sr: u32,
}

impl RtcpReportBlock {
    /// Size of a report block in bytes
    pub const SIZE: usize = 24;

    /// Create a new empty report block
    pub fn new(ssrc: RtpSsrc) -> Self {
        Self {
            ssrc,
            ..Default::default()
        }
    }

    /// Parse a report block from bytes
    pub fn parse(buf: &mut impl Buf) -> Result<Self, ParseError> {
        ensure_remaining(&*buf, Self::SIZE)?;

        let ssrc = buf.get_u32();
        let fraction_lost = buf.get_u8();
        let cumulative_lost = (buf.get_u8() as u32) << 16 | (buf.get_u16() as u32);
        let highest_seq = buf.get_u32();
        let jitter = buf.get_u32();
        let last_sr = buf.get_u32();
        let delay_since_last_sr = buf.get_u32();

        Ok(Self {
            ssrc,
            fraction_lost,
            cumulative_lost,
            highest_seq,
            jitter,
            last_sr,
            delay_since_last_sr,
        })
    }

    /// Serialize a report block to bytes
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.ssrc);
        buf.put_u8(self.fraction_lost);
        buf.put_u8(((self.cumulative_lost >> 16) & 0xFF) as u8);
        buf.put_u16((self.cumulative_lost & 0xFFFF) as u16);
        buf.put_u32(self.highest_seq);
        buf.put_u32(self.jitter);
        buf.put_u32(self.last_sr);
        buf.put_u32(self.delay_since_last_sr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_block_serialize_parse() {
        let original = RtcpReportBlock {
            ssrc: 0x12345678,
            fraction_lost: 64,
            cumulative_lost: 0x010203,
            highest_seq: 0x0001_0005,
            jitter: 120,
            last_sr: 0xAABBCCDD,
            delay_since_last_sr: 65536,
        };

        let mut buf = Vec::new();
        original.serialize(&mut buf);
        assert_eq!(buf.len(), RtcpReportBlock::SIZE);
        assert_eq!(&buf[4..8], &[64, 0x01, 0x02, 0x03]);

        let parsed = RtcpReportBlock::parse(&mut &buf[..]).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_report_block_truncated() {
        let buf = [0u8; 20];
        let err = RtcpReportBlock::parse(&mut &buf[..]).unwrap_err();
        assert_eq!(err, ParseError::Truncated { required: 24, available: 20 });
    }
}

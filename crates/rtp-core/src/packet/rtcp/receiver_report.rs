use bytes::{Buf, BufMut, Bytes};

use super::report_block::RtcpReportBlock;
use super::sender_report::check_block_count;
use crate::error::{EncodeError, ParseError};
use crate::packet::ensure_remaining;
use crate::RtpSsrc;

/// RTCP Receiver Report (RR) packet
/// Defined in RFC 3550 Section 6.4.2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpReceiverReport {
    /// SSRC of the receiver
    pub ssrc: RtpSsrc,

    /// Report blocks
    pub report_blocks: Vec<RtcpReportBlock>,

    /// Profile-specific extension trailing the report blocks
    pub profile_extension: Bytes,
}

impl RtcpReceiverReport {
    /// Create a new receiver report
    pub fn new(ssrc: RtpSsrc) -> Self {
        Self {
            ssrc,
            report_blocks: Vec::new(),
            profile_extension: Bytes::new(),
        }
    }

    /// Add a report block
    pub fn add_report_block(&mut self, block: RtcpReportBlock) {
        self.report_blocks.push(block);
    }

    pub(crate) fn parse(count: u8, mut body: &[u8]) -> Result<Self, ParseError> {
        ensure_remaining(&body, 4)?;
        let ssrc = body.get_u32();

        let mut report_blocks = Vec::with_capacity(count as usize);
        for _ in 0..count {
            report_blocks.push(RtcpReportBlock::parse(&mut body)?);
        }

        Ok(Self {
            ssrc,
            report_blocks,
            profile_extension: Bytes::copy_from_slice(body),
        })
    }

    pub(crate) fn count(&self) -> u8 {
        self.report_blocks.len() as u8
    }

    pub(crate) fn body_size(&self) -> usize {
        4 + self.report_blocks.len() * RtcpReportBlock::SIZE + self.profile_extension.len()
    }

    pub(crate) fn write_body(&self, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        check_block_count(self.report_blocks.len())?;

        buf.put_u32(self.ssrc);
        for block in &self.report_blocks {
            block.serialize(buf);
        }
        buf.put_slice(&self.profile_extension);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiver_report_body() {
        let mut rr = RtcpReceiverReport::new(0x11111111);
        let mut block = RtcpReportBlock::new(0x22222222);
        block.fraction_lost = 12;
        block.highest_seq = 1000;
        rr.add_report_block(block);
        rr.add_report_block(RtcpReportBlock::new(0x33333333));

        let mut buf = Vec::new();
        rr.write_body(&mut buf).unwrap();
        assert_eq!(buf.len(), 4 + 2 * RtcpReportBlock::SIZE);

        let parsed = RtcpReceiverReport::parse(rr.count(), &buf).unwrap();
        assert_eq!(parsed, rr);
    }

    #[test]
    fn test_too_many_blocks() {
        let mut rr = RtcpReceiverReport::new(1);
        for ssrc in 0..32 {
            rr.add_report_block(RtcpReportBlock::new(ssrc));
        }
        let mut buf = Vec::new();
        assert!(matches!(rr.write_body(&mut buf), Err(EncodeError::InvalidParameter(_))));
    }
}

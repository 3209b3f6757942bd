//! Pre-AVPF feedback packets from RFC 2032 (H.261), still sent by older endpoints

use bytes::{Buf, BufMut};

use crate::error::{EncodeError, ParseError};
use crate::packet::ensure_remaining;
use crate::{RtpSequenceNumber, RtpSsrc};

/// Legacy Full Intra Request (PT 192)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcpLegacyFir {
    pub ssrc: RtpSsrc,
}

impl RtcpLegacyFir {
    pub(crate) fn parse(mut body: &[u8]) -> Result<Self, ParseError> {
        ensure_remaining(&body, 4)?;
        Ok(Self { ssrc: body.get_u32() })
    }

    pub(crate) fn body_size(&self) -> usize {
        4
    }

    pub(crate) fn write_body(&self, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        buf.put_u32(self.ssrc);
        Ok(())
    }
}

/// Legacy NACK (PT 193): first lost sequence number and a bitmask of the following 16
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcpLegacyNack {
    pub ssrc: RtpSsrc,
    pub fsn: RtpSequenceNumber,
    pub blp: u16,
}

impl RtcpLegacyNack {
    pub(crate) fn parse(mut body: &[u8]) -> Result<Self, ParseError> {
        ensure_remaining(&body, 8)?;
        Ok(Self {
            ssrc: body.get_u32(),
            fsn: body.get_u16(),
            blp: body.get_u16(),
        })
    }

    pub(crate) fn body_size(&self) -> usize {
        8
    }

    pub(crate) fn write_body(&self, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        buf.put_u32(self.ssrc);
        buf.put_u16(self.fsn);
        buf.put_u16(self.blp);
        Ok(())
    }
}

use bytes::{Buf, BufMut, Bytes};

use crate::error::{EncodeError, ParseError};
use crate::packet::ensure_remaining;
use crate::RtpSsrc;

/// RTCP Application-Defined (APP) packet
/// Defined in RFC 3550 Section 6.7
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpApplicationDefined {
    /// 5-bit subtype carried in the count field
    pub subtype: u8,

    pub ssrc: RtpSsrc,

    /// Four ASCII characters naming the application
    pub name: [u8; 4],

    /// Application-dependent data, a multiple of 32 bits
    pub data: Bytes,
}

impl RtcpApplicationDefined {
    pub fn new(subtype: u8, ssrc: RtpSsrc, name: [u8; 4], data: Bytes) -> Self {
        Self {
            subtype,
            ssrc,
            name,
            data,
        }
    }

    pub(crate) fn parse(count: u8, mut body: &[u8]) -> Result<Self, ParseError> {
        ensure_remaining(&body, 8)?;
        let ssrc = body.get_u32();
        let mut name = [0u8; 4];
        body.copy_to_slice(&mut name);

        Ok(Self {
            subtype: count,
            ssrc,
            name,
            data: Bytes::copy_from_slice(body),
        })
    }

    pub(crate) fn count(&self) -> u8 {
        self.subtype
    }

    pub(crate) fn body_size(&self) -> usize {
        8 + self.data.len()
    }

    pub(crate) fn write_body(&self, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        if self.subtype > 31 {
            return Err(EncodeError::InvalidParameter(format!(
                "APP subtype {} exceeds 5 bits",
                self.subtype
            )));
        }
        if self.data.len() % 4 != 0 {
            return Err(EncodeError::InvalidParameter(format!(
                "APP data of {} bytes is not 32-bit aligned",
                self.data.len()
            )));
        }
        buf.put_u32(self.ssrc);
        buf.put_slice(&self.name);
        buf.put_slice(&self.data);
        Ok(())
    }
}

use bytes::{Buf, BufMut};

use crate::error::{EncodeError, ParseError};
use crate::packet::ensure_remaining;
use crate::RtpSsrc;

/// RTCP Goodbye (BYE) packet
/// Defined in RFC 3550 Section 6.6
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtcpGoodbye {
    /// SSRC/CSRC identifiers leaving the session
    pub sources: Vec<RtpSsrc>,

    /// Optional reason for leaving
    pub reason: Option<String>,
}

impl RtcpGoodbye {
    /// Create a BYE for a single source
    pub fn new(ssrc: RtpSsrc) -> Self {
        Self {
            sources: vec![ssrc],
            reason: None,
        }
    }

    pub fn with_reason(ssrc: RtpSsrc, reason: &str) -> Self {
        Self {
            sources: vec![ssrc],
            reason: Some(reason.to_string()),
        }
    }

    pub(crate) fn parse(count: u8, mut body: &[u8]) -> Result<Self, ParseError> {
        ensure_remaining(&body, count as usize * 4)?;
        let sources = (0..count).map(|_| body.get_u32()).collect();

        let reason = if body.has_remaining() {
            let len = body.get_u8() as usize;
            ensure_remaining(&body, len)?;
            Some(String::from_utf8_lossy(&body[..len]).into_owned())
        } else {
            None
        };

        Ok(Self { sources, reason })
    }

    pub(crate) fn count(&self) -> u8 {
        self.sources.len() as u8
    }

    fn reason_size(&self) -> usize {
        match &self.reason {
            Some(reason) => (1 + reason.len() + 3) / 4 * 4,
            None => 0,
        }
    }

    pub(crate) fn body_size(&self) -> usize {
        self.sources.len() * 4 + self.reason_size()
    }

    pub(crate) fn write_body(&self, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        if self.sources.len() > 31 {
            return Err(EncodeError::InvalidParameter(format!(
                "too many BYE sources: {}",
                self.sources.len()
            )));
        }
        for ssrc in &self.sources {
            buf.put_u32(*ssrc);
        }

        if let Some(reason) = &self.reason {
            if reason.len() > 255 {
                return Err(EncodeError::InvalidParameter(format!(
                    "BYE reason of {} bytes",
                    reason.len()
                )));
            }
            buf.put_u8(reason.len() as u8);
            buf.put_slice(reason.as_bytes());
            buf.put_bytes(0, self.reason_size() - 1 - reason.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bye_with_reason() {
        let bye = RtcpGoodbye::with_reason(0x0A0B0C0D, "done");
        let mut buf = Vec::new();
        bye.write_body(&mut buf).unwrap();

        assert_eq!(buf.len(), 4 + 8);
        assert_eq!(&buf[4..9], &[4, b'd', b'o', b'n', b'e']);

        let parsed = RtcpGoodbye::parse(1, &buf).unwrap();
        assert_eq!(parsed, bye);
    }

    #[test]
    fn test_bye_without_reason() {
        let bye = RtcpGoodbye::new(7);
        assert_eq!(bye.body_size(), 4);
        let parsed = RtcpGoodbye::parse(1, &[0, 0, 0, 7]).unwrap();
        assert_eq!(parsed, bye);
    }
}

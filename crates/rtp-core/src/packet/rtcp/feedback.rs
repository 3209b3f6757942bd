//! Transport layer feedback (RTCP PT 205, RFC 4585 / RFC 5104)

use bytes::{Buf, BufMut, Bytes};

use crate::error::{EncodeError, ParseError};
use crate::packet::ensure_remaining;
use crate::{RtpSequenceNumber, RtpSsrc};

/// Generic NACK
pub const RTPFB_NACK: u8 = 1;
/// Temporary Maximum Media Stream Bit Rate Request
pub const RTPFB_TMMBR: u8 = 3;
/// Temporary Maximum Media Stream Bit Rate Notification
pub const RTPFB_TMMBN: u8 = 4;
/// Transport-wide congestion control feedback
pub const RTPFB_TRANSPORT_WIDE: u8 = 15;

/// Largest TMMBR mantissa (17 bits)
const TMMB_MAX_MANTISSA: u64 = 0x1FFFF;

/// One generic NACK field: a lost packet id plus a bitmask of the 16 following
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NackField {
    /// First lost sequence number
    pub pid: RtpSequenceNumber,
    /// Bit i set means `pid + i + 1` is also lost
    pub blp: u16,
}

impl NackField {
    pub fn new(pid: RtpSequenceNumber, blp: u16) -> Self {
        Self { pid, blp }
    }

    /// All sequence numbers this field reports lost, in order
    pub fn lost_sequence_numbers(&self) -> impl Iterator<Item = RtpSequenceNumber> + '_ {
        std::iter::once(self.pid).chain(
            (0..16u16)
                .filter(move |bit| self.blp & (1 << bit) != 0)
                .map(move |bit| self.pid.wrapping_add(bit + 1)),
        )
    }
}

/// TMMBR/TMMBN entry with its bit-packed exponent and mantissa
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TmmbItem {
    pub ssrc: RtpSsrc,
    /// 6-bit exponent
    pub exp: u8,
    /// 17-bit mantissa
    pub mantissa: u32,
    /// 9-bit measured per-packet overhead in bytes
    pub overhead: u16,
}

impl TmmbItem {
    /// Encode `bitrate` with the smallest exponent that fits the mantissa
    pub fn new(ssrc: RtpSsrc, bitrate: u64, overhead: u16) -> Self {
        let mut exp = 0u8;
        while exp < 63 && (bitrate >> exp) > TMMB_MAX_MANTISSA {
            exp += 1;
        }
        Self {
            ssrc,
            exp,
            mantissa: ((bitrate >> exp) & TMMB_MAX_MANTISSA) as u32,
            overhead: overhead & 0x1FF,
        }
    }

    /// Bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        (self.mantissa as u64) << self.exp
    }

    fn parse(buf: &mut &[u8]) -> Result<Self, ParseError> {
        ensure_remaining(&*buf, 8)?;
        let ssrc = buf.get_u32();
        let packed = buf.get_u32();
        Ok(Self {
            ssrc,
            exp: (packed >> 26) as u8,
            mantissa: (packed >> 9) & 0x1FFFF,
            overhead: (packed & 0x1FF) as u16,
        })
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.ssrc);
        buf.put_u32(
            (self.exp as u32 & 0x3F) << 26
                | (self.mantissa & 0x1FFFF) << 9
                | (self.overhead as u32 & 0x1FF),
        );
    }
}

/// Feedback control information by FMT
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtpFeedbackFci {
    Nack(Vec<NackField>),
    Tmmbr(Vec<TmmbItem>),
    Tmmbn(Vec<TmmbItem>),
    /// Formats carried through unparsed (e.g. transport-wide CC)
    Other { fmt: u8, data: Bytes },
}

/// RTCP transport layer feedback packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpRtpFeedback {
    pub sender_ssrc: RtpSsrc,
    pub media_ssrc: RtpSsrc,
    pub fci: RtpFeedbackFci,
}

impl RtcpRtpFeedback {
    pub fn nack(sender_ssrc: RtpSsrc, media_ssrc: RtpSsrc, fields: Vec<NackField>) -> Self {
        Self {
            sender_ssrc,
            media_ssrc,
            fci: RtpFeedbackFci::Nack(fields),
        }
    }

    pub fn tmmbr(sender_ssrc: RtpSsrc, item: TmmbItem) -> Self {
        Self {
            sender_ssrc,
            media_ssrc: 0,
            fci: RtpFeedbackFci::Tmmbr(vec![item]),
        }
    }

    pub fn tmmbn(sender_ssrc: RtpSsrc, items: Vec<TmmbItem>) -> Self {
        Self {
            sender_ssrc,
            media_ssrc: 0,
            fci: RtpFeedbackFci::Tmmbn(items),
        }
    }

    pub fn fmt(&self) -> u8 {
        match &self.fci {
            RtpFeedbackFci::Nack(_) => RTPFB_NACK,
            RtpFeedbackFci::Tmmbr(_) => RTPFB_TMMBR,
            RtpFeedbackFci::Tmmbn(_) => RTPFB_TMMBN,
            RtpFeedbackFci::Other { fmt, .. } => *fmt,
        }
    }

    pub(crate) fn parse(fmt: u8, mut body: &[u8]) -> Result<Self, ParseError> {
        ensure_remaining(&body, 8)?;
        let sender_ssrc = body.get_u32();
        let media_ssrc = body.get_u32();

        let fci = match fmt {
            RTPFB_NACK => {
                if body.len() % 4 != 0 {
                    return Err(ParseError::Malformed(format!(
                        "NACK FCI of {} bytes",
                        body.len()
                    )));
                }
                let mut fields = Vec::with_capacity(body.len() / 4);
                while body.has_remaining() {
                    fields.push(NackField::new(body.get_u16(), body.get_u16()));
                }
                RtpFeedbackFci::Nack(fields)
            }
            RTPFB_TMMBR | RTPFB_TMMBN => {
                let mut items = Vec::with_capacity(body.len() / 8);
                while body.has_remaining() {
                    items.push(TmmbItem::parse(&mut body)?);
                }
                if fmt == RTPFB_TMMBR {
                    RtpFeedbackFci::Tmmbr(items)
                } else {
                    RtpFeedbackFci::Tmmbn(items)
                }
            }
            _ => RtpFeedbackFci::Other {
                fmt,
                data: Bytes::copy_from_slice(body),
            },
        };

        Ok(Self {
            sender_ssrc,
            media_ssrc,
            fci,
        })
    }

    pub(crate) fn body_size(&self) -> usize {
        8 + match &self.fci {
            RtpFeedbackFci::Nack(fields) => fields.len() * 4,
            RtpFeedbackFci::Tmmbr(items) | RtpFeedbackFci::Tmmbn(items) => items.len() * 8,
            RtpFeedbackFci::Other { data, .. } => data.len(),
        }
    }

    pub(crate) fn write_body(&self, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        if self.fmt() > 31 {
            return Err(EncodeError::InvalidParameter(format!(
                "feedback format {} exceeds 5 bits",
                self.fmt()
            )));
        }
        buf.put_u32(self.sender_ssrc);
        buf.put_u32(self.media_ssrc);

        match &self.fci {
            RtpFeedbackFci::Nack(fields) => {
                for field in fields {
                    buf.put_u16(field.pid);
                    buf.put_u16(field.blp);
                }
            }
            RtpFeedbackFci::Tmmbr(items) | RtpFeedbackFci::Tmmbn(items) => {
                for item in items {
                    item.write(buf);
                }
            }
            RtpFeedbackFci::Other { data, .. } => {
                if data.len() % 4 != 0 {
                    return Err(EncodeError::InvalidParameter(format!(
                        "feedback FCI of {} bytes is not 32-bit aligned",
                        data.len()
                    )));
                }
                buf.put_slice(data);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nack_field_expansion() {
        let field = NackField::new(100, 0b1000_0000_0000_0101);
        let lost: Vec<_> = field.lost_sequence_numbers().collect();
        assert_eq!(lost, vec![100, 101, 103, 116]);

        let wrapping = NackField::new(65535, 0b1);
        let lost: Vec<_> = wrapping.lost_sequence_numbers().collect();
        assert_eq!(lost, vec![65535, 0]);
    }

    #[test]
    fn test_tmmbr_bit_packing() {
        let item = TmmbItem::new(0x01020304, 1_000_000, 40);
        // 1_000_000 needs 3 shifts to fit 17 bits
        assert_eq!(item.exp, 3);
        assert_eq!(item.mantissa, 125_000);
        assert_eq!(item.bitrate(), 1_000_000);

        let mut buf = Vec::new();
        item.write(&mut buf);
        assert_eq!(
            &buf[4..],
            &[(3 << 2) | (125_000u32 >> 15) as u8, (125_000u32 >> 7) as u8, ((125_000u32 << 1) as u8) & 0xFE, 40]
        );

        let parsed = TmmbItem::parse(&mut &buf[..]).unwrap();
        assert_eq!(parsed, item);
    }

    #[test]
    fn test_tmmbr_overhead_high_bit() {
        let item = TmmbItem::new(1, 64_000, 300);
        let mut buf = Vec::new();
        item.write(&mut buf);
        assert_eq!(buf[6] & 0x01, 1);
        assert_eq!(buf[7], (300 & 0xFF) as u8);
        assert_eq!(TmmbItem::parse(&mut &buf[..]).unwrap().overhead, 300);
    }

    #[test]
    fn test_nack_body_round_trip() {
        let nack = RtcpRtpFeedback::nack(1, 2, vec![NackField::new(50, 0), NackField::new(70, 3)]);
        let mut buf = Vec::new();
        nack.write_body(&mut buf).unwrap();
        assert_eq!(buf.len(), nack.body_size());

        let parsed = RtcpRtpFeedback::parse(RTPFB_NACK, &buf).unwrap();
        assert_eq!(parsed, nack);
    }

    #[test]
    fn test_misaligned_nack() {
        let body = [0, 0, 0, 1, 0, 0, 0, 2, 0, 50];
        assert!(matches!(
            RtcpRtpFeedback::parse(RTPFB_NACK, &body),
            Err(ParseError::Malformed(_))
        ));
    }
}

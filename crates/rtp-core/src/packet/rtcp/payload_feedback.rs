//! Payload-specific feedback (RTCP PT 206, RFC 4585 / RFC 5104)

use bytes::{Buf, BufMut, Bytes};

use crate::error::{EncodeError, ParseError};
use crate::packet::ensure_remaining;
use crate::RtpSsrc;

/// Picture Loss Indication
pub const PSFB_PLI: u8 = 1;
/// Full Intra Request
pub const PSFB_FIR: u8 = 4;
/// Application layer feedback
pub const PSFB_ALF: u8 = 15;

/// Identifier of a REMB application layer message
const REMB_IDENTIFIER: &[u8; 4] = b"REMB";

/// Largest REMB mantissa (18 bits)
const REMB_MAX_MANTISSA: u64 = 0x3FFFF;

/// One FIR entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirEntry {
    /// Media sender asked for a decoder refresh
    pub ssrc: RtpSsrc,
    /// Command sequence number, incremented per new request
    pub seq: u8,
}

/// Receiver Estimated Maximum Bitrate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remb {
    /// 6-bit exponent
    pub exp: u8,
    /// 18-bit mantissa
    pub mantissa: u32,
    /// Media sources the estimate applies to
    pub ssrcs: Vec<RtpSsrc>,
}

impl Remb {
    /// Encode `bitrate` with the smallest exponent that fits the mantissa
    pub fn new(bitrate: u64, ssrcs: Vec<RtpSsrc>) -> Self {
        let mut exp = 0u8;
        while exp < 63 && (bitrate >> exp) > REMB_MAX_MANTISSA {
            exp += 1;
        }
        Self {
            exp,
            mantissa: ((bitrate >> exp) & REMB_MAX_MANTISSA) as u32,
            ssrcs,
        }
    }

    /// Bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        (self.mantissa as u64) << self.exp
    }

    /// Parse from an ALF body, `None` when the identifier is not REMB
    fn parse(body: &[u8]) -> Result<Option<Self>, ParseError> {
        if body.len() < 4 || &body[..4] != REMB_IDENTIFIER {
            return Ok(None);
        }
        let mut buf = &body[4..];
        ensure_remaining(&buf, 4)?;
        let num_ssrc = buf.get_u8() as usize;
        let b = buf.get_u8();
        let exp = b >> 2;
        let mantissa = (b as u32 & 0x03) << 16 | buf.get_u16() as u32;

        ensure_remaining(&buf, num_ssrc * 4)?;
        let ssrcs = (0..num_ssrc).map(|_| buf.get_u32()).collect();

        Ok(Some(Self {
            exp,
            mantissa,
            ssrcs,
        }))
    }

    fn size(&self) -> usize {
        8 + self.ssrcs.len() * 4
    }

    fn write(&self, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        if self.ssrcs.len() > 255 {
            return Err(EncodeError::InvalidParameter(format!(
                "REMB with {} SSRCs",
                self.ssrcs.len()
            )));
        }
        buf.put_slice(REMB_IDENTIFIER);
        buf.put_u8(self.ssrcs.len() as u8);
        buf.put_u8((self.exp & 0x3F) << 2 | ((self.mantissa >> 16) & 0x03) as u8);
        buf.put_u16((self.mantissa & 0xFFFF) as u16);
        for ssrc in &self.ssrcs {
            buf.put_u32(*ssrc);
        }
        Ok(())
    }
}

/// Feedback control information by FMT
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadFeedbackFci {
    PictureLossIndication,
    FullIntraRequest(Vec<FirEntry>),
    ReceiverEstimatedMaxBitrate(Remb),
    /// Application layer feedback other than REMB
    ApplicationLayer(Bytes),
    Other { fmt: u8, data: Bytes },
}

/// RTCP payload-specific feedback packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpPayloadFeedback {
    pub sender_ssrc: RtpSsrc,
    pub media_ssrc: RtpSsrc,
    pub fci: PayloadFeedbackFci,
}

impl RtcpPayloadFeedback {
    pub fn pli(sender_ssrc: RtpSsrc, media_ssrc: RtpSsrc) -> Self {
        Self {
            sender_ssrc,
            media_ssrc,
            fci: PayloadFeedbackFci::PictureLossIndication,
        }
    }

    /// FIR addressed to `media_ssrc`; the common header media SSRC is unused
    pub fn fir(sender_ssrc: RtpSsrc, media_ssrc: RtpSsrc, seq: u8) -> Self {
        Self {
            sender_ssrc,
            media_ssrc: 0,
            fci: PayloadFeedbackFci::FullIntraRequest(vec![FirEntry {
                ssrc: media_ssrc,
                seq,
            }]),
        }
    }

    pub fn remb(sender_ssrc: RtpSsrc, remb: Remb) -> Self {
        Self {
            sender_ssrc,
            media_ssrc: 0,
            fci: PayloadFeedbackFci::ReceiverEstimatedMaxBitrate(remb),
        }
    }

    pub fn fmt(&self) -> u8 {
        match &self.fci {
            PayloadFeedbackFci::PictureLossIndication => PSFB_PLI,
            PayloadFeedbackFci::FullIntraRequest(_) => PSFB_FIR,
            PayloadFeedbackFci::ReceiverEstimatedMaxBitrate(_)
            | PayloadFeedbackFci::ApplicationLayer(_) => PSFB_ALF,
            PayloadFeedbackFci::Other { fmt, .. } => *fmt,
        }
    }

    pub(crate) fn parse(fmt: u8, mut body: &[u8]) -> Result<Self, ParseError> {
        ensure_remaining(&body, 8)?;
        let sender_ssrc = body.get_u32();
        let media_ssrc = body.get_u32();

        let fci = match fmt {
            PSFB_PLI => {
                if body.has_remaining() {
                    return Err(ParseError::Malformed(format!(
                        "PLI carries {} bytes of FCI",
                        body.len()
                    )));
                }
                PayloadFeedbackFci::PictureLossIndication
            }
            PSFB_FIR => {
                if body.len() % 8 != 0 {
                    return Err(ParseError::Malformed(format!(
                        "FIR FCI of {} bytes",
                        body.len()
                    )));
                }
                let mut entries = Vec::with_capacity(body.len() / 8);
                while body.has_remaining() {
                    let ssrc = body.get_u32();
                    let seq = body.get_u8();
                    // Reserved
                    body.advance(3);
                    entries.push(FirEntry { ssrc, seq });
                }
                PayloadFeedbackFci::FullIntraRequest(entries)
            }
            PSFB_ALF => match Remb::parse(body)? {
                Some(remb) => PayloadFeedbackFci::ReceiverEstimatedMaxBitrate(remb),
                None => PayloadFeedbackFci::ApplicationLayer(Bytes::copy_from_slice(body)),
            },
            _ => PayloadFeedbackFci::Other {
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
            PayloadFeedbackFci::PictureLossIndication => 0,
            PayloadFeedbackFci::FullIntraRequest(entries) => entries.len() * 8,
            PayloadFeedbackFci::ReceiverEstimatedMaxBitrate(remb) => remb.size(),
            PayloadFeedbackFci::ApplicationLayer(data)
            | PayloadFeedbackFci::Other { data, .. } => data.len(),
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
            PayloadFeedbackFci::PictureLossIndication => {}
            PayloadFeedbackFci::FullIntraRequest(entries) => {
                for entry in entries {
                    buf.put_u32(entry.ssrc);
                    buf.put_u8(entry.seq);
                    buf.put_bytes(0, 3);
                }
            }
            PayloadFeedbackFci::ReceiverEstimatedMaxBitrate(remb) => remb.write(buf)?,
            PayloadFeedbackFci::ApplicationLayer(data)
            | PayloadFeedbackFci::Other { data, .. } => {
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

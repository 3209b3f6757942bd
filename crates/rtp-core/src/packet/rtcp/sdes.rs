use bytes::{Buf, BufMut, Bytes};

use crate::error::{EncodeError, ParseError};
use crate::packet::ensure_remaining;
use crate::RtpSsrc;

/// SDES item types (RFC 3550 Section 6.5)
pub const SDES_END: u8 = 0;
pub const SDES_CNAME: u8 = 1;

/// One SDES item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpSdesItem {
    pub item_type: u8,
    pub value: Bytes,
}

/// Items describing one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpSdesChunk {
    pub ssrc: RtpSsrc,
    pub items: Vec<RtcpSdesItem>,
}

impl RtcpSdesChunk {
    /// Chunk size including the end marker and padding to a 32-bit boundary
    fn size(&self) -> usize {
        let items: usize = self.items.iter().map(|item| 2 + item.value.len()).sum();
        (4 + items + 1 + 3) / 4 * 4
    }
}

/// RTCP Source Description (SDES) packet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtcpSourceDescription {
    pub chunks: Vec<RtcpSdesChunk>,
}

impl RtcpSourceDescription {
    /// SDES carrying a single CNAME for `ssrc`
    pub fn with_cname(ssrc: RtpSsrc, cname: &str) -> Self {
        Self {
            chunks: vec![RtcpSdesChunk {
                ssrc,
                items: vec![RtcpSdesItem {
                    item_type: SDES_CNAME,
                    value: Bytes::copy_from_slice(cname.as_bytes()),
                }],
            }],
        }
    }

    /// CNAME announced for `ssrc`, if any
    pub fn cname(&self, ssrc: RtpSsrc) -> Option<String> {
        self.chunks
            .iter()
            .filter(|chunk| chunk.ssrc == ssrc)
            .flat_map(|chunk| chunk.items.iter())
            .find(|item| item.item_type == SDES_CNAME)
            .map(|item| String::from_utf8_lossy(&item.value).into_owned())
    }

    pub(crate) fn parse(count: u8, body: &[u8]) -> Result<Self, ParseError> {
        let mut buf = body;
        let mut chunks = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let chunk_start = body.len() - buf.len();
            ensure_remaining(&buf, 4)?;
            let ssrc = buf.get_u32();

            let mut items = Vec::new();
            loop {
                ensure_remaining(&buf, 1)?;
                let item_type = buf.get_u8();
                if item_type == SDES_END {
                    break;
                }
                ensure_remaining(&buf, 1)?;
                let len = buf.get_u8() as usize;
                ensure_remaining(&buf, len)?;
                items.push(RtcpSdesItem {
                    item_type,
                    value: Bytes::copy_from_slice(&buf[..len]),
                });
                buf.advance(len);
            }

            // Skip null padding up to the next 32-bit boundary
            let consumed = body.len() - buf.len() - chunk_start;
            let padding = (4 - consumed % 4) % 4;
            ensure_remaining(&buf, padding)?;
            buf.advance(padding);

            chunks.push(RtcpSdesChunk { ssrc, items });
        }

        Ok(Self { chunks })
    }

    pub(crate) fn count(&self) -> u8 {
        self.chunks.len() as u8
    }

    pub(crate) fn body_size(&self) -> usize {
        self.chunks.iter().map(RtcpSdesChunk::size).sum()
    }

    pub(crate) fn write_body(&self, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        if self.chunks.len() > 31 {
            return Err(EncodeError::InvalidParameter(format!(
                "too many SDES chunks: {}",
                self.chunks.len()
            )));
        }

        for chunk in &self.chunks {
            buf.put_u32(chunk.ssrc);
            let mut written = 4;
            for item in &chunk.items {
                if item.value.len() > 255 {
                    return Err(EncodeError::InvalidParameter(format!(
                        "SDES item of {} bytes",
                        item.value.len()
                    )));
                }
                buf.put_u8(item.item_type);
                buf.put_u8(item.value.len() as u8);
                buf.put_slice(&item.value);
                written += 2 + item.value.len();
            }
            // End marker plus padding
            buf.put_bytes(SDES_END, chunk.size() - written);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cname_chunk_layout() {
        let sdes = RtcpSourceDescription::with_cname(0x01020304, "mcu");
        let mut buf = Vec::new();
        sdes.write_body(&mut buf).unwrap();

        // ssrc, CNAME(3) "mcu", end, padding to 12 bytes
        assert_eq!(buf, vec![1, 2, 3, 4, 1, 3, b'm', b'c', b'u', 0, 0, 0]);
        assert_eq!(sdes.body_size(), 12);

        let parsed = RtcpSourceDescription::parse(1, &buf).unwrap();
        assert_eq!(parsed.cname(0x01020304).as_deref(), Some("mcu"));
        assert_eq!(parsed, sdes);
    }

    #[test]
    fn test_aligned_chunk_gets_full_null_word() {
        // 4 + 2 + 2 = 8 bytes of items, the end marker needs another word
        let sdes = RtcpSourceDescription::with_cname(1, "ab");
        assert_eq!(sdes.body_size(), 12);
    }

    #[test]
    fn test_missing_end_marker() {
        let buf = [0, 0, 0, 1, 1, 3, b'a', b'b', b'c'];
        assert!(matches!(
            RtcpSourceDescription::parse(1, &buf),
            Err(ParseError::Truncated { .. })
        ));
    }
}

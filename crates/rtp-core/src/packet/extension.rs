//! RTP header extensions (RFC 5285)
//!
//! Extension element IDs are negotiated in SDP, so every session carries its
//! own [`ExtensionMap`]. Parsing accepts both the one-byte (`0xBEDE`) and the
//! two-byte (`0x100x`) forms; serialization always uses the one-byte form.

use std::collections::HashMap;

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use super::ensure_remaining;
use crate::error::{EncodeError, ParseError};

/// Profile identifier of the one-byte header form
pub const ONE_BYTE_PROFILE: u16 = 0xBEDE;

/// Profile identifier mask of the two-byte header form
pub const TWO_BYTE_PROFILE: u16 = 0x1000;

/// Element ID that stops one-byte parsing
const ONE_BYTE_TERMINATOR: u8 = 15;

/// Header extensions the session understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtensionType {
    /// Client-to-mixer audio level (RFC 6464)
    SsrcAudioLevel,
    /// Transmission time offset (RFC 5450)
    TimeOffset,
    /// Absolute send time, 6.18 fixed-point seconds
    AbsoluteSendTime,
}

impl ExtensionType {
    /// SDP `extmap` URI for this extension
    pub fn uri(&self) -> &'static str {
        match self {
            ExtensionType::SsrcAudioLevel => "urn:ietf:params:rtp-hdrext:ssrc-audio-level",
            ExtensionType::TimeOffset => "urn:ietf:params:rtp-hdrext:toffset",
            ExtensionType::AbsoluteSendTime => {
                "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time"
            }
        }
    }

    /// Look up an extension by its SDP `extmap` URI
    pub fn from_uri(uri: &str) -> Option<Self> {
        [
            ExtensionType::SsrcAudioLevel,
            ExtensionType::TimeOffset,
            ExtensionType::AbsoluteSendTime,
        ]
        .into_iter()
        .find(|ty| ty.uri() == uri)
    }

    fn value_len(&self) -> usize {
        match self {
            ExtensionType::SsrcAudioLevel => 1,
            ExtensionType::TimeOffset | ExtensionType::AbsoluteSendTime => 3,
        }
    }
}

/// Negotiated mapping from extension element ID to meaning
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionMap {
    entries: HashMap<u8, ExtensionType>,
}

impl ExtensionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `id` to `ty`, replacing any previous mapping for either
    pub fn insert(&mut self, id: u8, ty: ExtensionType) {
        self.entries.retain(|_, existing| *existing != ty);
        self.entries.insert(id, ty);
    }

    pub fn get(&self, id: u8) -> Option<ExtensionType> {
        self.entries.get(&id).copied()
    }

    /// Negotiated ID for `ty`, if any
    pub fn id_of(&self, ty: ExtensionType) -> Option<u8> {
        self.entries
            .iter()
            .find_map(|(id, existing)| (*existing == ty).then_some(*id))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Audio level indication
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioLevel {
    /// Voice activity flag
    pub voice_activity: bool,
    /// Level in -dBov, 0..=127
    pub level: u8,
}

/// Decoded header extension values of one packet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderExtensions {
    pub audio_level: Option<AudioLevel>,
    /// Signed 24-bit transmission offset in media clock units
    pub time_offset: Option<i32>,
    /// Raw 24-bit absolute send time
    pub abs_send_time: Option<u32>,
}

impl HeaderExtensions {
    pub fn is_empty(&self) -> bool {
        self.audio_level.is_none() && self.time_offset.is_none() && self.abs_send_time.is_none()
    }

    /// Parse an extension block body given its profile identifier
    pub fn parse(profile: u16, data: &[u8], map: &ExtensionMap) -> Result<Self, ParseError> {
        let mut extensions = Self::default();
        let two_byte = profile & 0xFFF0 == TWO_BYTE_PROFILE;

        if profile != ONE_BYTE_PROFILE && !two_byte {
            // Unknown profile, nothing we can interpret
            return Ok(extensions);
        }

        let mut buf = data;
        while buf.has_remaining() {
            let first = buf.get_u8();
            if first == 0 {
                // Padding
                continue;
            }

            let (id, len) = if two_byte {
                ensure_remaining(&buf, 1)?;
                (first, buf.get_u8() as usize)
            } else {
                let id = first >> 4;
                if id == ONE_BYTE_TERMINATOR {
                    break;
                }
                (id, (first & 0x0F) as usize + 1)
            };

            ensure_remaining(&buf, len)?;
            let value = &buf[..len];
            if let Some(ty) = map.get(id) {
                extensions.apply(ty, value)?;
            }
            buf.advance(len);
        }

        Ok(extensions)
    }

    fn apply(&mut self, ty: ExtensionType, value: &[u8]) -> Result<(), ParseError> {
        if value.len() < ty.value_len() {
            return Err(ParseError::Malformed(format!(
                "{:?} extension needs {} bytes, got {}",
                ty,
                ty.value_len(),
                value.len()
            )));
        }

        match ty {
            ExtensionType::SsrcAudioLevel => {
                self.audio_level = Some(AudioLevel {
                    voice_activity: value[0] & 0x80 != 0,
                    level: value[0] & 0x7F,
                });
            }
            ExtensionType::TimeOffset => {
                let raw = read_u24(value);
                let offset = if raw & 0x80_0000 != 0 {
                    raw as i32 - 0x100_0000
                } else {
                    raw as i32
                };
                self.time_offset = Some(offset);
            }
            ExtensionType::AbsoluteSendTime => {
                self.abs_send_time = Some(read_u24(value));
            }
        }
        Ok(())
    }

    fn elements(&self, map: &ExtensionMap) -> Result<Vec<(u8, ExtensionType)>, EncodeError> {
        let present = [
            (ExtensionType::SsrcAudioLevel, self.audio_level.is_some()),
            (ExtensionType::TimeOffset, self.time_offset.is_some()),
            (ExtensionType::AbsoluteSendTime, self.abs_send_time.is_some()),
        ];

        let mut elements = Vec::new();
        for (ty, is_set) in present {
            if !is_set {
                continue;
            }
            // Values without a negotiated ID are not sent
            let Some(id) = map.id_of(ty) else { continue };
            if id == 0 || id >= ONE_BYTE_TERMINATOR {
                return Err(EncodeError::InvalidParameter(format!(
                    "extension id {} not usable in one-byte form",
                    id
                )));
            }
            elements.push((id, ty));
        }
        Ok(elements)
    }

    /// Size of the serialized block including its 4-byte header, 0 when nothing is sent
    pub fn encoded_len(&self, map: &ExtensionMap) -> Result<usize, EncodeError> {
        let elements = self.elements(map)?;
        if elements.is_empty() {
            return Ok(0);
        }
        let body: usize = elements.iter().map(|(_, ty)| 1 + ty.value_len()).sum();
        Ok(4 + (body + 3) / 4 * 4)
    }

    /// Write the one-byte form block: profile, length in words, elements, zero padding
    pub fn write(&self, map: &ExtensionMap, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        let elements = self.elements(map)?;
        if elements.is_empty() {
            return Ok(());
        }
        let body: usize = elements.iter().map(|(_, ty)| 1 + ty.value_len()).sum();
        let words = (body + 3) / 4;

        buf.put_u16(ONE_BYTE_PROFILE);
        buf.put_u16(words as u16);

        for (id, ty) in elements {
            buf.put_u8(id << 4 | (ty.value_len() as u8 - 1));
            match ty {
                ExtensionType::SsrcAudioLevel => {
                    let level = self.audio_level.unwrap_or_default();
                    let vad = if level.voice_activity { 0x80 } else { 0 };
                    buf.put_u8(vad | (level.level & 0x7F));
                }
                ExtensionType::TimeOffset => {
                    let offset = self.time_offset.unwrap_or_default();
                    write_u24(buf, (offset as u32) & 0x00FF_FFFF);
                }
                ExtensionType::AbsoluteSendTime => {
                    write_u24(buf, self.abs_send_time.unwrap_or_default());
                }
            }
        }
        buf.put_bytes(0, words * 4 - body);

        Ok(())
    }
}

fn read_u24(value: &[u8]) -> u32 {
    (value[0] as u32) << 16 | (value[1] as u32) << 8 | value[2] as u32
}

fn write_u24(buf: &mut impl BufMut, value: u32) {
    buf.put_u8((value >> 16) as u8);
    buf.put_u8((value >> 8) as u8);
    buf.put_u8(value as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_map() -> ExtensionMap {
        let mut map = ExtensionMap::new();
        map.insert(1, ExtensionType::SsrcAudioLevel);
        map.insert(2, ExtensionType::TimeOffset);
        map.insert(3, ExtensionType::AbsoluteSendTime);
        map
    }

    #[test]
    fn test_parse_one_byte_form() {
        let map = test_map();
        // audio level (vad, 42), abs-send-time 0x123456, padding
        let data = [0x10, 0xAA, 0x32, 0x12, 0x34, 0x56, 0x00, 0x00];
        let ext = HeaderExtensions::parse(ONE_BYTE_PROFILE, &data, &map).unwrap();

        assert_eq!(ext.audio_level, Some(AudioLevel { voice_activity: true, level: 42 }));
        assert_eq!(ext.abs_send_time, Some(0x123456));
        assert_eq!(ext.time_offset, None);
    }

    #[test]
    fn test_parse_negative_time_offset() {
        let map = test_map();
        let data = [0x22, 0xFF, 0xFF, 0xFE];
        let ext = HeaderExtensions::parse(ONE_BYTE_PROFILE, &data, &map).unwrap();
        assert_eq!(ext.time_offset, Some(-2));
    }

    #[test]
    fn test_terminator_stops_parsing() {
        let map = test_map();
        // ID 15 terminates, the trailing bytes would otherwise be truncated
        let data = [0xF0, 0x32, 0x12, 0x34];
        let ext = HeaderExtensions::parse(ONE_BYTE_PROFILE, &data, &map).unwrap();
        assert!(ext.is_empty());
    }

    #[test]
    fn test_parse_two_byte_form() {
        let map = test_map();
        let data = [0x03, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        let ext = HeaderExtensions::parse(0x1000, &data, &map).unwrap();
        assert_eq!(ext.abs_send_time, Some(0x000100));
    }

    #[test]
    fn test_truncated_element() {
        let map = test_map();
        let data = [0x32, 0x12];
        let err = HeaderExtensions::parse(ONE_BYTE_PROFILE, &data, &map).unwrap_err();
        assert!(matches!(err, ParseError::Truncated { .. }));
    }

    #[test]
    fn test_unmapped_ids_skipped() {
        let map = ExtensionMap::new();
        let data = [0x10, 0xAA, 0x00, 0x00];
        let ext = HeaderExtensions::parse(ONE_BYTE_PROFILE, &data, &map).unwrap();
        assert!(ext.is_empty());
    }

    #[test]
    fn test_write_pads_to_word() {
        let map = test_map();
        let ext = HeaderExtensions {
            audio_level: Some(AudioLevel { voice_activity: false, level: 10 }),
            time_offset: Some(-1),
            abs_send_time: None,
        };

        assert_eq!(ext.encoded_len(&map).unwrap(), 4 + 8);

        let mut out = Vec::new();
        ext.write(&map, &mut out).unwrap();
        assert_eq!(
            out,
            vec![0xBE, 0xDE, 0x00, 0x02, 0x10, 0x0A, 0x22, 0xFF, 0xFF, 0xFF, 0x00, 0x00]
        );

        let parsed = HeaderExtensions::parse(ONE_BYTE_PROFILE, &out[4..], &map).unwrap();
        assert_eq!(parsed, ext);
    }

    #[test]
    fn test_map_lookup() {
        let mut map = test_map();
        assert_eq!(map.id_of(ExtensionType::AbsoluteSendTime), Some(3));
        map.insert(5, ExtensionType::AbsoluteSendTime);
        assert_eq!(map.id_of(ExtensionType::AbsoluteSendTime), Some(5));
        assert_eq!(map.get(3), None);
        assert_eq!(
            ExtensionType::from_uri("urn:ietf:params:rtp-hdrext:toffset"),
            Some(ExtensionType::TimeOffset)
        );
    }
}

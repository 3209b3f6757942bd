use std::fmt;

use bitvec::prelude::*;
use bytes::{Buf, BufMut, Bytes};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::extension::{ExtensionMap, HeaderExtensions};
use super::{ensure_capacity, ensure_remaining};
use crate::error::{EncodeError, ParseError};
use crate::{RtpCsrc, RtpSequenceNumber, RtpSsrc, RtpTimestamp};

/// RTP protocol version (always 2 in practice)
pub const RTP_VERSION: u8 = 2;

/// Minimum header size (without CSRC or extensions)
pub const RTP_MIN_HEADER_SIZE: usize = 12;

/// Size of the original sequence number prefix of an RTX payload
pub const RTX_HEADER_SIZE: usize = 2;

/// Kind of media carried by a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Audio,
    Video,
    Text,
}

/// Codec identifier resolved through the negotiated payload type map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodecId(pub u16);

/// RTP header according to RFC 3550
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RtpHeader {
    /// Padding flag as received (never set on send)
    pub padding: bool,

    /// Marker bit
    pub marker: bool,

    /// Payload type
    pub payload_type: u8,

    /// Sequence number
    pub sequence_number: RtpSequenceNumber,

    /// Timestamp
    pub timestamp: RtpTimestamp,

    /// Synchronization source identifier
    pub ssrc: RtpSsrc,

    /// Contributing source identifiers
    pub csrc: Vec<RtpCsrc>,

    /// Decoded header extensions
    pub extensions: HeaderExtensions,
}

impl RtpHeader {
    /// Create a new RTP header with default values
    pub fn new(
        payload_type: u8,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        ssrc: RtpSsrc,
    ) -> Self {
        Self {
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            ..Default::default()
        }
    }

    /// Serialized size of the header with `map` deciding which extensions are written
    pub fn size(&self, map: &ExtensionMap) -> Result<usize, EncodeError> {
        Ok(RTP_MIN_HEADER_SIZE + self.csrc.len() * 4 + self.extensions.encoded_len(map)?)
    }

    /// Parse a header, leaving `buf` positioned at the payload
    pub fn parse(buf: &mut &[u8], map: &ExtensionMap) -> Result<Self, ParseError> {
        ensure_remaining(&*buf, RTP_MIN_HEADER_SIZE)?;

        // version (2 bits), padding (1 bit), extension (1 bit), CSRC count (4 bits)
        let first_byte = buf.get_u8();
        let bits = first_byte.view_bits::<Msb0>();

        let version = bits[0..2].load_be::<u8>();
        if version != RTP_VERSION {
            return Err(ParseError::InvalidVersion(version));
        }

        let padding = bits[2];
        let extension = bits[3];
        let cc = bits[4..8].load_be::<u8>();

        // marker (1 bit), payload type (7 bits)
        let second_byte = buf.get_u8();
        let bits = second_byte.view_bits::<Msb0>();

        let marker = bits[0];
        let payload_type = bits[1..8].load_be::<u8>();

        let sequence_number = buf.get_u16();
        let timestamp = buf.get_u32();
        let ssrc = buf.get_u32();

        ensure_remaining(&*buf, cc as usize * 4)?;
        let csrc = (0..cc).map(|_| buf.get_u32()).collect();

        let extensions = if extension {
            ensure_remaining(&*buf, 4)?;
            let profile = buf.get_u16();
            let ext_length = buf.get_u16() as usize * 4;
            ensure_remaining(&*buf, ext_length)?;

            let parsed = HeaderExtensions::parse(profile, &buf[..ext_length], map)?;
            buf.advance(ext_length);
            parsed
        } else {
            HeaderExtensions::default()
        };

        Ok(Self {
            padding,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc,
            extensions,
        })
    }

    /// Write the header into `buf`; the caller has checked capacity
    fn write(&self, map: &ExtensionMap, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        if self.csrc.len() > 15 {
            return Err(EncodeError::InvalidParameter(format!(
                "too many CSRCs: {}",
                self.csrc.len()
            )));
        }
        let has_extension = self.extensions.encoded_len(map)? > 0;

        let mut first_byte = 0u8;
        {
            let bits = first_byte.view_bits_mut::<Msb0>();
            bits[0..2].store_be(RTP_VERSION);
            bits.set(3, has_extension);
            bits[4..8].store_be(self.csrc.len() as u8);
        }
        buf.put_u8(first_byte);

        let mut second_byte = 0u8;
        {
            let bits = second_byte.view_bits_mut::<Msb0>();
            bits.set(0, self.marker);
            bits[1..8].store_be(self.payload_type & 0x7F);
        }
        buf.put_u8(second_byte);

        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
        for csrc in &self.csrc {
            buf.put_u32(*csrc);
        }

        self.extensions.write(map, buf)
    }
}

/// One RTP datagram: header, payload and the process-local metadata attached
/// while it moves through the session.
#[derive(Clone)]
pub struct RtpPacket {
    /// Media kind of the owning session
    pub media: MediaKind,

    /// Codec resolved from the payload type, once the RTP map is known
    pub codec: Option<CodecId>,

    /// RTP header
    pub header: RtpHeader,

    /// Payload data
    pub payload: Bytes,

    /// Sequence number extended with the owning source's cycle count
    pub extended_seq: u32,

    /// When the packet was received
    pub arrival_time: Option<Instant>,

    /// When the packet was handed to the transport
    pub send_time: Option<Instant>,
}

impl RtpPacket {
    /// Create a new RTP packet with header and payload
    pub fn new(header: RtpHeader, payload: Bytes) -> Self {
        let extended_seq = header.sequence_number as u32;
        Self {
            media: MediaKind::default(),
            codec: None,
            header,
            payload,
            extended_seq,
            arrival_time: None,
            send_time: None,
        }
    }

    /// Create a new RTP packet with the given header fields and payload
    pub fn new_with_payload(
        payload_type: u8,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        ssrc: RtpSsrc,
        payload: Bytes,
    ) -> Self {
        Self::new(
            RtpHeader::new(payload_type, sequence_number, timestamp, ssrc),
            payload,
        )
    }

    /// Create an outgoing packet for a codec; the session fills in the rest
    pub fn for_codec(media: MediaKind, codec: CodecId, timestamp: RtpTimestamp, payload: Bytes) -> Self {
        let mut packet = Self::new(RtpHeader::new(0, 0, timestamp, 0), payload);
        packet.media = media;
        packet.codec = Some(codec);
        packet
    }

    pub fn with_media(mut self, media: MediaKind) -> Self {
        self.media = media;
        self
    }

    pub fn with_marker(mut self, marker: bool) -> Self {
        self.header.marker = marker;
        self
    }

    pub fn sequence_number(&self) -> RtpSequenceNumber {
        self.header.sequence_number
    }

    pub fn ssrc(&self) -> RtpSsrc {
        self.header.ssrc
    }

    pub fn timestamp(&self) -> RtpTimestamp {
        self.header.timestamp
    }

    pub fn payload_type(&self) -> u8 {
        self.header.payload_type
    }

    /// Set the extended sequence number from the source's cycle count
    pub fn set_cycles(&mut self, cycles: u16) {
        self.extended_seq = (cycles as u32) << 16 | self.header.sequence_number as u32;
    }

    /// Number of wire sequence wraps encoded in the extended sequence number
    pub fn cycles(&self) -> u16 {
        (self.extended_seq >> 16) as u16
    }

    /// Serialized size of the packet
    pub fn size(&self, map: &ExtensionMap) -> Result<usize, EncodeError> {
        Ok(self.header.size(map)? + self.payload.len())
    }

    /// Parse an RTP packet from bytes
    pub fn parse(data: &[u8], map: &ExtensionMap) -> Result<Self, ParseError> {
        let mut buf = data;
        let header = RtpHeader::parse(&mut buf, map)?;

        let mut payload_len = buf.len();
        if header.padding {
            let pad = match buf.last() {
                Some(pad) => *pad as usize,
                None => {
                    return Err(ParseError::Malformed(
                        "padding flag set on empty payload".to_string(),
                    ))
                }
            };
            if pad == 0 || pad > payload_len {
                return Err(ParseError::Malformed(format!(
                    "invalid padding length {} for payload of {} bytes",
                    pad, payload_len
                )));
            }
            payload_len -= pad;
        }

        Ok(Self::new(header, Bytes::copy_from_slice(&buf[..payload_len])))
    }

    /// Serialize into `buf`, returning the number of bytes written
    pub fn serialize(&self, map: &ExtensionMap, buf: &mut [u8]) -> Result<usize, EncodeError> {
        let size = self.size(map)?;
        ensure_capacity(size, buf.len())?;

        let mut out = &mut buf[..size];
        self.header.write(map, &mut out)?;
        out.put_slice(&self.payload);

        Ok(size)
    }

    /// Serialize into a freshly allocated buffer
    pub fn to_bytes(&self, map: &ExtensionMap) -> Result<Bytes, EncodeError> {
        let mut buf = vec![0u8; self.size(map)?];
        self.serialize(map, &mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Wrap this packet in the RTX payload format (RFC 4588)
    pub fn to_rtx(&self, rtx_ssrc: RtpSsrc, rtx_payload_type: u8, rtx_seq: RtpSequenceNumber) -> Self {
        let mut payload = Vec::with_capacity(RTX_HEADER_SIZE + self.payload.len());
        payload.put_u16(self.header.sequence_number);
        payload.put_slice(&self.payload);

        let mut header = self.header.clone();
        header.ssrc = rtx_ssrc;
        header.payload_type = rtx_payload_type;
        header.sequence_number = rtx_seq;
        header.padding = false;

        Self {
            media: self.media,
            codec: self.codec,
            header,
            payload: Bytes::from(payload),
            extended_seq: rtx_seq as u32,
            arrival_time: None,
            send_time: self.send_time,
        }
    }

    /// Recover the original packet from an RTX packet
    pub fn from_rtx(&self, media_ssrc: RtpSsrc, payload_type: u8) -> Result<Self, ParseError> {
        let mut buf = &self.payload[..];
        ensure_remaining(&buf, RTX_HEADER_SIZE)?;
        let original_seq = buf.get_u16();

        let mut header = self.header.clone();
        header.ssrc = media_ssrc;
        header.payload_type = payload_type;
        header.sequence_number = original_seq;

        let mut packet = Self::new(header, self.payload.slice(RTX_HEADER_SIZE..));
        packet.media = self.media;
        packet.arrival_time = self.arrival_time;
        Ok(packet)
    }
}

impl fmt::Debug for RtpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtpPacket")
            .field("media", &self.media)
            .field("pt", &self.header.payload_type)
            .field("seq", &self.header.sequence_number)
            .field("ext_seq", &self.extended_seq)
            .field("ts", &self.header.timestamp)
            .field("ssrc", &format_args!("{:#010x}", self.header.ssrc))
            .field("marker", &self.header.marker)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::extension::{AudioLevel, ExtensionType};

    #[test]
    fn test_rtp_packet_creation() {
        let payload = Bytes::from_static(b"test payload");
        let packet = RtpPacket::new_with_payload(96, 1000, 12345, 0xabcdef01, payload.clone());

        assert_eq!(packet.header.payload_type, 96);
        assert_eq!(packet.sequence_number(), 1000);
        assert_eq!(packet.timestamp(), 12345);
        assert_eq!(packet.ssrc(), 0xabcdef01);
        assert_eq!(packet.extended_seq, 1000);
        assert_eq!(packet.payload, payload);
    }

    #[test]
    fn test_header_wire_layout() {
        let map = ExtensionMap::new();
        let packet = RtpPacket::new_with_payload(96, 0x1234, 0x01020304, 0xabcdef01, Bytes::from_static(&[0xAA]))
            .with_marker(true);
        let bytes = packet.to_bytes(&map).unwrap();

        assert_eq!(
            &bytes[..],
            &[0x80, 0xE0, 0x12, 0x34, 0x01, 0x02, 0x03, 0x04, 0xab, 0xcd, 0xef, 0x01, 0xAA]
        );
    }

    #[test]
    fn test_serialize_parse_with_extensions_and_csrc() {
        let mut map = ExtensionMap::new();
        map.insert(1, ExtensionType::SsrcAudioLevel);
        map.insert(3, ExtensionType::AbsoluteSendTime);

        let mut packet = RtpPacket::new_with_payload(111, 7, 960, 0x11223344, Bytes::from_static(b"opus"));
        packet.header.csrc = vec![0xdeadbeef, 0xcafebabe];
        packet.header.extensions.audio_level = Some(AudioLevel { voice_activity: true, level: 30 });
        packet.header.extensions.abs_send_time = Some(0x0ABCDE);

        let bytes = packet.to_bytes(&map).unwrap();
        assert_eq!(bytes.len(), 12 + 8 + 4 + 8 + 4);

        let parsed = RtpPacket::parse(&bytes, &map).unwrap();
        assert_eq!(parsed.header, packet.header);
        assert_eq!(parsed.payload, packet.payload);
    }

    #[test]
    fn test_parse_rejects_bad_version() {
        let map = ExtensionMap::new();
        let data = [0x40, 0x60, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1];
        assert_eq!(RtpPacket::parse(&data, &map).unwrap_err(), ParseError::InvalidVersion(1));
    }

    #[test]
    fn test_parse_truncated_extension() {
        let map = ExtensionMap::new();
        // Extension flag with a declared length of 2 words but only 4 bytes left
        let data = [
            0x90, 0x60, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0xBE, 0xDE, 0x00, 0x02, 0x10, 0xAA, 0x00, 0x00,
        ];
        let err = RtpPacket::parse(&data, &map).unwrap_err();
        assert_eq!(err, ParseError::Truncated { required: 8, available: 4 });
    }

    #[test]
    fn test_parse_strips_padding() {
        let map = ExtensionMap::new();
        let data = [0xA0, 0x60, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0x01, 0x02, 0x00, 0x00, 0x03];
        let packet = RtpPacket::parse(&data, &map).unwrap();
        assert_eq!(&packet.payload[..], &[0x01, 0x02]);

        let bad = [0xA0, 0x60, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0x01, 0x09];
        assert!(matches!(RtpPacket::parse(&bad, &map), Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_serialize_buffer_too_small() {
        let map = ExtensionMap::new();
        let packet = RtpPacket::new_with_payload(96, 1, 1, 1, Bytes::from_static(&[0u8; 100]));
        let mut buf = [0u8; 64];
        let err = packet.serialize(&map, &mut buf).unwrap_err();
        assert_eq!(err, EncodeError::BufferTooSmall { required: 112, available: 64 });
    }

    #[test]
    fn test_rtx_wrap_unwrap() {
        let mut packet = RtpPacket::new_with_payload(96, 0xBEEF, 9000, 0x1111, Bytes::from_static(b"frame"));
        packet.header.marker = true;

        let rtx = packet.to_rtx(0x2222, 97, 5);
        assert_eq!(rtx.ssrc(), 0x2222);
        assert_eq!(rtx.payload_type(), 97);
        assert_eq!(rtx.sequence_number(), 5);
        assert_eq!(&rtx.payload[..2], &[0xBE, 0xEF]);
        assert_eq!(&rtx.payload[2..], b"frame");

        let restored = rtx.from_rtx(0x1111, 96).unwrap();
        assert_eq!(restored.header, packet.header);
        assert_eq!(restored.payload, packet.payload);

        let empty = RtpPacket::new_with_payload(97, 1, 1, 0x2222, Bytes::from_static(&[0x01]));
        assert!(matches!(empty.from_rtx(0x1111, 96), Err(ParseError::Truncated { .. })));
    }

    #[test]
    fn test_extended_sequence_cycles() {
        let mut packet = RtpPacket::new_with_payload(96, 3, 0, 1, Bytes::new());
        packet.set_cycles(2);
        assert_eq!(packet.extended_seq, 2 * 65536 + 3);
        assert_eq!(packet.cycles(), 2);
    }
}

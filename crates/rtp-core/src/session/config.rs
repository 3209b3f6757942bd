use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::buffer::jitter::JitterBufferConfig;
use crate::buffer::retransmission::RtxConfig;
use crate::packet::{CodecId, ExtensionMap, MediaKind};
use crate::stats::loss::DEFAULT_LOSS_WINDOW;
use crate::time::clock_rates;
use crate::RtpSsrc;

/// Default minimum spacing between sender reports
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Default window during which a repeated full refresh request is suppressed
pub const DEFAULT_FULL_REFRESH_WINDOW: Duration = Duration::from_millis(500);

/// How to ask the remote sender for a new key frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FullRefreshMode {
    /// Picture Loss Indication (RFC 4585), what browsers expect
    #[default]
    Pli,
    /// Full Intra Request with a sequence number (RFC 5104)
    Fir,
}

/// Negotiated payload type mapping for one direction.
///
/// Holds codec payload types and RTX payload types with their associated
/// (`apt`) media payload type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtpMap {
    codecs: HashMap<u8, CodecId>,
    rtx: HashMap<u8, u8>,
}

impl RtpMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `payload_type` to `codec`
    pub fn with_codec(mut self, payload_type: u8, codec: CodecId) -> Self {
        self.insert(payload_type, codec);
        self
    }

    /// Declare `rtx_type` as the RTX payload type for media type `apt`
    pub fn with_rtx(mut self, rtx_type: u8, apt: u8) -> Self {
        self.insert_rtx(rtx_type, apt);
        self
    }

    pub fn insert(&mut self, payload_type: u8, codec: CodecId) {
        self.codecs.insert(payload_type, codec);
    }

    pub fn insert_rtx(&mut self, rtx_type: u8, apt: u8) {
        self.rtx.insert(rtx_type, apt);
    }

    pub fn codec_for_type(&self, payload_type: u8) -> Option<CodecId> {
        self.codecs.get(&payload_type).copied()
    }

    /// Payload type for `codec`, the lowest one if several are mapped
    pub fn type_for_codec(&self, codec: CodecId) -> Option<u8> {
        self.codecs
            .iter()
            .filter(|(_, mapped)| **mapped == codec)
            .map(|(payload_type, _)| *payload_type)
            .min()
    }

    /// Media payload type an RTX payload type wraps
    pub fn apt_for_rtx(&self, rtx_type: u8) -> Option<u8> {
        self.rtx.get(&rtx_type).copied()
    }

    /// RTX payload type wrapping media payload type `apt`
    pub fn rtx_for_apt(&self, apt: u8) -> Option<u8> {
        self.rtx
            .iter()
            .filter(|(_, mapped)| **mapped == apt)
            .map(|(rtx_type, _)| *rtx_type)
            .min()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Media carried by the session
    pub media: MediaKind,

    /// RTP clock rate in Hz
    pub clock_rate: u32,

    /// Canonical name sent in SDES
    pub cname: String,

    /// Local media SSRC, random when unset
    pub ssrc: Option<RtpSsrc>,

    /// Whether NACK feedback was negotiated
    pub use_nack: bool,

    /// Answer NACKs with RTX (RFC 4588) instead of duplicates
    pub use_rtx: Option<RtxConfig>,

    /// PLI or FIR for key frame requests
    pub full_refresh_mode: FullRefreshMode,

    /// Negotiated header extension IDs
    pub extension_map: ExtensionMap,

    /// Initial jitter buffer settings, retuned by `set_rtt`
    pub jitter: JitterBufferConfig,

    /// Depth of the loss window in packets
    pub loss_window: usize,

    /// Minimum spacing between sender reports
    pub report_interval: Duration,

    /// A second full refresh request within this window is suppressed
    pub full_refresh_window: Duration,
}

impl SessionConfig {
    /// Defaults suited to `media`, including its usual clock rate
    pub fn for_media(media: MediaKind) -> Self {
        let clock_rate = match media {
            MediaKind::Audio => clock_rates::AUDIO_8KHZ,
            MediaKind::Video => clock_rates::VIDEO_90KHZ,
            MediaKind::Text => clock_rates::TEXT_1KHZ,
        };
        Self {
            media,
            clock_rate,
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            media: MediaKind::Audio,
            clock_rate: clock_rates::AUDIO_8KHZ,
            cname: "mcu@localhost".to_string(),
            ssrc: None,
            use_nack: true,
            use_rtx: None,
            full_refresh_mode: FullRefreshMode::Pli,
            extension_map: ExtensionMap::new(),
            jitter: JitterBufferConfig::default(),
            loss_window: DEFAULT_LOSS_WINDOW,
            report_interval: DEFAULT_REPORT_INTERVAL,
            full_refresh_window: DEFAULT_FULL_REFRESH_WINDOW,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VP8: CodecId = CodecId(1);
    const OPUS: CodecId = CodecId(2);

    #[test]
    fn test_rtp_map_lookups() {
        let map = RtpMap::new()
            .with_codec(96, VP8)
            .with_codec(111, OPUS)
            .with_codec(100, VP8)
            .with_rtx(97, 96);

        assert_eq!(map.codec_for_type(111), Some(OPUS));
        assert_eq!(map.codec_for_type(97), None);
        assert_eq!(map.type_for_codec(VP8), Some(96));
        assert_eq!(map.type_for_codec(CodecId(9)), None);
        assert_eq!(map.apt_for_rtx(97), Some(96));
        assert_eq!(map.rtx_for_apt(96), Some(97));
        assert_eq!(map.rtx_for_apt(111), None);
        assert!(!map.is_empty());
    }

    #[test]
    fn test_config_for_media() {
        let config = SessionConfig::for_media(MediaKind::Video);
        assert_eq!(config.clock_rate, 90_000);
        assert_eq!(config.loss_window, 640);
        assert_eq!(config.report_interval, Duration::from_secs(1));
        assert_eq!(config.full_refresh_mode, FullRefreshMode::Pli);
    }
}

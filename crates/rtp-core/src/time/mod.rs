//! Time and clock utilities for RTP
//!
//! RTP media clock conversions and the 6.18 fixed-point format used by the
//! absolute-send-time header extension.

use std::time::Duration;

/// Convert RTP timestamp to duration at a given clock rate
pub fn rtp_timestamp_to_duration(timestamp: u32, clock_rate: u32) -> Duration {
    if clock_rate == 0 {
        return Duration::from_secs(0);
    }

    let seconds = timestamp / clock_rate;
    let remainder = timestamp % clock_rate;
    let nanos = ((remainder as u64) * 1_000_000_000) / (clock_rate as u64);

    Duration::new(seconds as u64, nanos as u32)
}

/// Convert duration to RTP timestamp units at a given clock rate (wrapping)
pub fn duration_to_rtp_timestamp(duration: Duration, clock_rate: u32) -> u32 {
    let seconds = duration.as_secs();
    let nanos = duration.subsec_nanos();

    let timestamp_seconds = seconds.wrapping_mul(clock_rate as u64);
    let timestamp_fraction = ((nanos as u64) * (clock_rate as u64)) / 1_000_000_000;

    timestamp_seconds.wrapping_add(timestamp_fraction) as u32
}

/// Encode milliseconds as a 24-bit absolute-send-time value (6.18 fixed point seconds)
pub fn abs_send_time_from_millis(ms: u64) -> u32 {
    (((ms << 18) / 1000) & 0x00FF_FFFF) as u32
}

/// Decode a 24-bit absolute-send-time value to milliseconds
pub fn abs_send_time_to_millis(value: u32) -> u64 {
    ((value & 0x00FF_FFFF) as u64 * 1000) >> 18
}

/// Convert a duration to the 1/65536 second units used by the RTCP DLSR field
pub fn duration_to_dlsr(duration: Duration) -> u32 {
    let units = duration.as_micros() * 65536 / 1_000_000;
    units.min(u32::MAX as u128) as u32
}

/// Convert a DLSR field value back to a duration
pub fn dlsr_to_duration(dlsr: u32) -> Duration {
    Duration::from_micros((dlsr as u64 * 1_000_000) >> 16)
}

/// Typical clock rates for common codecs
pub mod clock_rates {
    /// G.711, G.729 (8kHz)
    pub const AUDIO_8KHZ: u32 = 8000;

    /// Opus (48kHz)
    pub const AUDIO_48KHZ: u32 = 48000;

    /// Video and text (90kHz / 1kHz)
    pub const VIDEO_90KHZ: u32 = 90000;

    /// T.140 real-time text
    pub const TEXT_1KHZ: u32 = 1000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_conversion() {
        let duration = Duration::from_millis(125);
        let timestamp = duration_to_rtp_timestamp(duration, 8000);
        assert_eq!(timestamp, 1000);

        let converted = rtp_timestamp_to_duration(timestamp, 8000);
        assert_eq!(converted.as_millis(), 125);

        assert_eq!(duration_to_rtp_timestamp(Duration::from_secs(1), 90000), 90000);
    }

    #[test]
    fn test_abs_send_time() {
        // One second is 1 << 18
        assert_eq!(abs_send_time_from_millis(1000), 1 << 18);
        assert_eq!(abs_send_time_to_millis(1 << 18), 1000);
        assert_eq!(abs_send_time_to_millis(abs_send_time_from_millis(1500)), 1500);

        // 64 seconds wraps the 6-bit integer part
        assert_eq!(abs_send_time_from_millis(64_000), 0);
    }

    #[test]
    fn test_dlsr_units() {
        assert_eq!(duration_to_dlsr(Duration::from_secs(1)), 65536);
        assert_eq!(duration_to_dlsr(Duration::from_millis(500)), 32768);
        assert_eq!(dlsr_to_duration(65536), Duration::from_secs(1));
    }
}

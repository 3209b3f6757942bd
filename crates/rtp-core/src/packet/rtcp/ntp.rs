use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds between the NTP epoch (1900) and the UNIX epoch (1970)
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// NTP timestamp representation (64 bits)
/// As defined in RFC 3550
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub struct NtpTimestamp {
    /// Seconds since January 1, 1900
    pub seconds: u32,

    /// Fraction of a second
    pub fraction: u32,
}

impl NtpTimestamp {
    /// Create a new NTP timestamp from the current system time
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0));
        Self::from_duration_since_unix_epoch(since_epoch)
    }

    /// Convert to a 64-bit representation
    pub fn to_u64(&self) -> u64 {
        (self.seconds as u64) << 32 | (self.fraction as u64)
    }

    /// Middle 32 bits, as echoed in the LSR field of report blocks
    /// (RFC 3550 Section 6.4.1)
    pub fn to_u32(&self) -> u32 {
        ((self.seconds & 0x0000FFFF) << 16) | ((self.fraction & 0xFFFF0000) >> 16)
    }

    /// Convert from a 64-bit representation
    pub fn from_u64(value: u64) -> Self {
        Self {
            seconds: (value >> 32) as u32,
            fraction: value as u32,
        }
    }

    /// Convert to a Duration since UNIX epoch
    pub fn to_duration_since_unix_epoch(&self) -> Duration {
        let seconds = (self.seconds as u64).saturating_sub(NTP_UNIX_OFFSET);
        let nanos = ((self.fraction as u64) * 1_000_000_000) >> 32;
        Duration::new(seconds, nanos as u32)
    }

    /// Create a new NTP timestamp from a Duration since UNIX epoch
    pub fn from_duration_since_unix_epoch(duration: Duration) -> Self {
        let seconds = duration.as_secs() + NTP_UNIX_OFFSET;
        let fraction = ((duration.subsec_nanos() as u64) << 32) / 1_000_000_000;

        Self {
            seconds: seconds as u32,
            fraction: fraction as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ntp_timestamp_now_is_recent() {
        let timestamp = NtpTimestamp::now();
        assert!(timestamp.seconds > 3786825600); // Jan 1, 2020 in NTP time
    }

    #[test]
    fn test_middle_bits() {
        let timestamp = NtpTimestamp {
            seconds: 0x1234_5678,
            fraction: 0x9ABC_DEF0,
        };
        assert_eq!(timestamp.to_u32(), 0x5678_9ABC);
        assert_eq!(NtpTimestamp::from_u64(timestamp.to_u64()), timestamp);
    }

    #[test]
    fn test_duration_conversion() {
        let duration = Duration::new(1577836800, 500_000_000);
        let timestamp = NtpTimestamp::from_duration_since_unix_epoch(duration);

        assert_eq!(timestamp.seconds, 3786825600);
        assert_eq!(timestamp.fraction, 0x8000_0000);
        assert_eq!(timestamp.to_duration_since_unix_epoch(), duration);
    }
}

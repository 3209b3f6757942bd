//! Congestion controller contract
//!
//! Bandwidth estimation is an external collaborator. Sessions feed it
//! arrivals, losses and round trip times and read back the estimate they
//! advertise in REMB. One controller may be shared by the audio and video
//! sessions of a participant, so implementations guard their own state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::packet::RtpPacket;
use crate::RtpSsrc;

pub trait CongestionController: Send + Sync {
    /// A media packet arrived from `ssrc`
    fn update(&self, ssrc: RtpSsrc, packet: &RtpPacket);

    /// `lost` packets from `ssrc` were detected as missing
    fn update_lost(&self, ssrc: RtpSsrc, lost: u32);

    /// A new round trip time sample for `ssrc`
    fn update_rtt(&self, ssrc: RtpSsrc, rtt: Duration);

    /// Current receive bitrate estimate in bits per second
    fn estimated_bitrate(&self) -> u64;
}

/// Controller that always reports a fixed bitrate
#[derive(Debug, Default)]
pub struct FixedBitrate {
    bitrate: AtomicU64,
}

impl FixedBitrate {
    pub fn new(bitrate: u64) -> Self {
        Self {
            bitrate: AtomicU64::new(bitrate),
        }
    }

    pub fn set_bitrate(&self, bitrate: u64) {
        self.bitrate.store(bitrate, Ordering::Relaxed);
    }
}

impl CongestionController for FixedBitrate {
    fn update(&self, _ssrc: RtpSsrc, _packet: &RtpPacket) {}

    fn update_lost(&self, _ssrc: RtpSsrc, _lost: u32) {}

    fn update_rtt(&self, _ssrc: RtpSsrc, _rtt: Duration) {}

    fn estimated_bitrate(&self) -> u64 {
        self.bitrate.load(Ordering::Relaxed)
    }
}

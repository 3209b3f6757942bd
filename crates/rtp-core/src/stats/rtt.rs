use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::packet::rtcp::RtcpReportBlock;
use crate::time::dlsr_to_duration;

/// Sent SRs remembered for matching report echoes
const MAX_SENT_REPORTS: usize = 16;

/// Round-trip time estimator driven by SR/RR exchanges.
///
/// Every sent SR is remembered with its local send instant; a report block
/// echoing that SR in its LSR field yields
/// `rtt = (now - sent) - delay_since_last_sr`.
#[derive(Debug, Clone, Default)]
pub struct RttEstimator {
    /// Middle NTP bits and local send instant of recent SRs
    sent: VecDeque<(u32, Instant)>,

    /// Most recent sample
    latest: Option<Duration>,

    /// Smoothed estimate, EWMA with alpha = 1/8
    smoothed: Option<Duration>,

    /// Number of samples processed
    samples: u64,
}

impl RttEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the time when an SR was sent
    pub fn record_sr_sent(&mut self, ntp_middle: u32, sent_at: Instant) {
        if self.sent.len() == MAX_SENT_REPORTS {
            self.sent.pop_front();
        }
        self.sent.push_back((ntp_middle, sent_at));
    }

    /// Process a report block echoing one of our SRs.
    ///
    /// Returns the new sample, or `None` when the echo does not match a
    /// remembered SR.
    pub fn process_report_block(&mut self, block: &RtcpReportBlock, now: Instant) -> Option<Duration> {
        if block.last_sr == 0 {
            // No SR reference, can't calculate RTT
            return None;
        }

        let sent_at = self
            .sent
            .iter()
            .rev()
            .find(|(ntp, _)| *ntp == block.last_sr)
            .map(|(_, at)| *at)?;

        let elapsed = now.saturating_duration_since(sent_at);
        let rtt = elapsed.saturating_sub(dlsr_to_duration(block.delay_since_last_sr));

        self.latest = Some(rtt);
        self.smoothed = Some(match self.smoothed {
            Some(smoothed) => (smoothed * 7 + rtt) / 8,
            None => rtt,
        });
        self.samples += 1;

        Some(rtt)
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<Duration> {
        self.latest
    }

    /// Smoothed estimate
    pub fn smoothed(&self) -> Option<Duration> {
        self.smoothed
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::duration_to_dlsr;

    #[tokio::test(start_paused = true)]
    async fn test_rtt_from_echo() {
        let mut estimator = RttEstimator::new();
        let sent = Instant::now();
        estimator.record_sr_sent(0x1234_5678, sent);

        tokio::time::advance(Duration::from_millis(150)).await;

        let mut block = RtcpReportBlock::new(1);
        block.last_sr = 0x1234_5678;
        block.delay_since_last_sr = duration_to_dlsr(Duration::from_millis(50));

        let rtt = estimator.process_report_block(&block, Instant::now()).unwrap();
        assert_eq!(rtt.as_millis(), 100);
        assert_eq!(estimator.latest(), Some(rtt));
        assert_eq!(estimator.samples(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_echo_ignored() {
        let mut estimator = RttEstimator::new();
        estimator.record_sr_sent(1, Instant::now());

        let mut block = RtcpReportBlock::new(1);
        assert_eq!(estimator.process_report_block(&block, Instant::now()), None);

        block.last_sr = 2;
        assert_eq!(estimator.process_report_block(&block, Instant::now()), None);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut estimator = RttEstimator::new();
        let now = Instant::now();
        for ntp in 1..=(MAX_SENT_REPORTS as u32 + 4) {
            estimator.record_sr_sent(ntp, now);
        }

        let mut block = RtcpReportBlock::new(1);
        block.last_sr = 1;
        assert_eq!(estimator.process_report_block(&block, now), None);
        block.last_sr = MAX_SENT_REPORTS as u32 + 4;
        assert!(estimator.process_report_block(&block, now).is_some());
    }
}

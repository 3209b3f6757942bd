//! Reordering jitter buffer for received RTP packets
//!
//! Packets are keyed by extended sequence number and released in order. The
//! consumer never waits longer than `max_wait_time` for a missing packet: once
//! the lowest buffered packet has been resident that long it is released and
//! the gap is given up for lost.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::trace;

use crate::packet::RtpPacket;

/// Default maximum wait for a missing packet in milliseconds
pub const DEFAULT_MAX_WAIT_MS: u64 = 60;

/// Jitter buffer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterBufferConfig {
    /// How long the lowest buffered packet may wait for its predecessors
    pub max_wait_time: Duration,
}

impl Default for JitterBufferConfig {
    fn default() -> Self {
        Self {
            max_wait_time: Duration::from_millis(DEFAULT_MAX_WAIT_MS),
        }
    }
}

/// Observable state of the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterState {
    /// Nothing buffered
    Empty,
    /// Packets waiting for delivery
    Buffering,
    /// Cancelled; only non-blocking drains deliver
    Draining,
}

/// Statistics for the jitter buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JitterBufferStats {
    /// Packets currently buffered
    pub buffered: usize,
    /// Packets handed to the consumer
    pub delivered: u64,
    /// Packets with empty payloads consumed without delivery
    pub discarded: u64,
    /// Packets rejected for arriving after their slot was released
    pub late: u64,
    /// Packets rejected as duplicates of buffered ones
    pub duplicates: u64,
    /// Shortest time a released packet spent buffered
    pub min_waited: Option<Duration>,
    /// Longest time a released packet spent buffered
    pub max_waited: Option<Duration>,
    /// Average time released packets spent buffered
    pub avg_waited: Duration,
}

enum Poll {
    Ready(RtpPacket),
    Until(Instant),
    Idle,
}

struct Inner {
    packets: BTreeMap<u32, (RtpPacket, Instant)>,
    /// Next extended sequence number to release, `None` accepts anything
    next: Option<u32>,
    cancelled: bool,
    hurry_up: bool,
    max_wait: Duration,
    stats: JitterBufferStats,
    released: u64,
    waited_total: Duration,
}

impl Inner {
    fn new(max_wait: Duration) -> Self {
        Self {
            packets: BTreeMap::new(),
            next: None,
            cancelled: false,
            hurry_up: false,
            max_wait,
            stats: JitterBufferStats::default(),
            released: 0,
            waited_total: Duration::ZERO,
        }
    }

    fn record_waited(&mut self, waited: Duration) {
        self.released += 1;
        self.waited_total += waited;
        let stats = &mut self.stats;
        stats.min_waited = Some(stats.min_waited.map_or(waited, |min| min.min(waited)));
        stats.max_waited = Some(stats.max_waited.map_or(waited, |max| max.max(waited)));
        stats.avg_waited = self.waited_total / self.released as u32;
    }

    /// Release the lowest packet if the timing rules allow it
    fn poll(&mut self, now: Instant) -> Poll {
        loop {
            let Some((&seq, (_, arrived))) = self.packets.first_key_value() else {
                self.hurry_up = false;
                return Poll::Idle;
            };
            let deadline = *arrived + self.max_wait;

            let releasable = match self.next {
                None => true,
                Some(next) => seq == next || deadline <= now || self.hurry_up,
            };
            if !releasable {
                return Poll::Until(deadline);
            }

            let Some((_, (packet, arrived))) = self.packets.pop_first() else {
                return Poll::Idle;
            };
            if let Some(next) = self.next {
                if seq != next {
                    trace!("Jitter buffer skipping {} lost packets before {}", seq - next, seq);
                }
            }
            self.next = Some(seq.wrapping_add(1));
            self.record_waited(now.saturating_duration_since(arrived));
            if self.packets.is_empty() {
                self.hurry_up = false;
            }

            if packet.payload.is_empty() {
                self.stats.discarded += 1;
                continue;
            }

            self.stats.delivered += 1;
            return Poll::Ready(packet);
        }
    }
}

/// Reordering buffer between the receive path and the media consumer.
///
/// `add` never blocks; `wait` suspends until a packet can be released or the
/// buffer is cancelled.
pub struct JitterBuffer {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl JitterBuffer {
    pub fn new(config: JitterBufferConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::new(config.max_wait_time)),
            notify: Notify::new(),
        }
    }

    /// Insert a packet keyed by its extended sequence number.
    ///
    /// Returns `false` when the packet is dropped, either because its slot has
    /// already been released or because it duplicates a buffered packet.
    pub fn add(&self, packet: RtpPacket) -> bool {
        let seq = packet.extended_seq;
        {
            let mut inner = self.inner.lock();

            if matches!(inner.next, Some(next) if seq < next) {
                trace!("Dropping late packet {} (next {:?})", seq, inner.next);
                inner.stats.late += 1;
                return false;
            }
            if inner.packets.contains_key(&seq) {
                trace!("Dropping duplicate packet {}", seq);
                inner.stats.duplicates += 1;
                return false;
            }

            let arrived = packet.arrival_time.unwrap_or_else(Instant::now);
            inner.packets.insert(seq, (packet, arrived));
        }

        self.notify.notify_one();
        true
    }

    /// Wait for the next packet in order.
    ///
    /// Returns `None` once the buffer is cancelled.
    pub async fn wait(&self) -> Option<RtpPacket> {
        loop {
            let notified = self.notify.notified();

            let deadline = {
                let mut inner = self.inner.lock();
                if inner.cancelled {
                    return None;
                }
                match inner.poll(Instant::now()) {
                    Poll::Ready(packet) => return Some(packet),
                    Poll::Until(deadline) => Some(deadline),
                    Poll::Idle => None,
                }
            };

            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Release the next packet if one is ready now, without waiting
    pub fn get_ordered(&self) -> Option<RtpPacket> {
        match self.inner.lock().poll(Instant::now()) {
            Poll::Ready(packet) => Some(packet),
            Poll::Until(_) | Poll::Idle => None,
        }
    }

    /// Wake waiters and make `wait` return `None` until the next reset
    pub fn cancel(&self) {
        self.inner.lock().cancelled = true;
        self.notify.notify_waiters();
    }

    /// Release buffered packets without waiting for order until the buffer drains
    pub fn hurry_up(&self) {
        self.inner.lock().hurry_up = true;
        self.notify.notify_one();
    }

    /// Drop buffered packets and accept any sequence number next
    pub fn reset(&self) {
        {
            let mut inner = self.inner.lock();
            let max_wait = inner.max_wait;
            *inner = Inner::new(max_wait);
        }
        self.notify.notify_one();
    }

    /// Drop buffered packets, keeping the release position
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.packets.clear();
        inner.hurry_up = false;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().packets.is_empty()
    }

    pub fn max_wait_time(&self) -> Duration {
        self.inner.lock().max_wait
    }

    pub fn set_max_wait_time(&self, max_wait: Duration) {
        self.inner.lock().max_wait = max_wait;
        // Deadlines moved, let the waiter recompute
        self.notify.notify_one();
    }

    /// Next extended sequence number expected, if any
    pub fn next_expected(&self) -> Option<u32> {
        self.inner.lock().next
    }

    pub fn state(&self) -> JitterState {
        let inner = self.inner.lock();
        if inner.cancelled {
            JitterState::Draining
        } else if inner.packets.is_empty() {
            JitterState::Empty
        } else {
            JitterState::Buffering
        }
    }

    pub fn stats(&self) -> JitterBufferStats {
        let inner = self.inner.lock();
        JitterBufferStats {
            buffered: inner.packets.len(),
            ..inner.stats.clone()
        }
    }
}

impl Default for JitterBuffer {
    fn default() -> Self {
        Self::new(JitterBufferConfig::default())
    }
}

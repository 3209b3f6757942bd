use bitvec::prelude::*;

use crate::packet::rtcp::NackField;

/// Number of packets tracked by default
pub const DEFAULT_LOSS_WINDOW: usize = 640;

/// Sliding window over received extended sequence numbers.
///
/// Bit `i` of the window stands for extended sequence number `first + i`;
/// the window slides forward when a packet beyond its end arrives.
#[derive(Debug, Clone)]
pub struct LossTracker {
    /// Received flags, one per tracked sequence number
    received: BitVec<usize, Lsb0>,

    /// Extended sequence number of bit 0
    first: Option<u32>,

    /// Number of bits in use (highest seen offset + 1)
    len: usize,

    /// Highest extended sequence number observed
    highest: Option<u32>,

    /// Not-yet-seen numbers opened by the last observation
    last_gap: usize,
}

impl LossTracker {
    /// Create a tracker with a window of `size` packets
    pub fn new(size: usize) -> Self {
        Self {
            received: bitvec![usize, Lsb0; 0; size.max(1)],
            first: None,
            len: 0,
            highest: None,
            last_gap: 0,
        }
    }

    /// Window depth
    pub fn window_size(&self) -> usize {
        self.received.len()
    }

    /// Extended sequence number at the start of the window
    pub fn first(&self) -> Option<u32> {
        self.first
    }

    /// Mark `ext_seq` as seen.
    ///
    /// Returns the number of not-yet-seen sequence numbers below `ext_seq`
    /// still inside the window. Packets older than the window return 0.
    pub fn observe(&mut self, ext_seq: u32) -> usize {
        self.last_gap = 0;

        let first = match self.first {
            Some(first) if ext_seq < first => return 0,
            Some(first) => first,
            None => {
                self.first = Some(ext_seq);
                ext_seq
            }
        };

        let size = self.received.len();
        let mut pos = (ext_seq - first) as usize;

        if pos >= size {
            let shift = (pos + 1 - size).min(size);
            self.received.shift_start(shift);
            self.first = Some(ext_seq - (size as u32 - 1));
            self.len = self.len.saturating_sub(shift);
            pos = size - 1;
        }

        if pos >= self.len {
            self.last_gap = match self.highest {
                Some(highest) if ext_seq > highest => {
                    ((ext_seq - highest - 1) as usize).min(size - 1)
                }
                _ => 0,
            };
            self.len = pos + 1;
            self.highest = Some(ext_seq);
        }

        self.received.set(pos, true);
        self.received[..pos].count_zeros()
    }

    /// Not-yet-seen sequence numbers the last `observe` call opened
    pub fn last_gap(&self) -> usize {
        self.last_gap
    }

    /// Total not-yet-seen sequence numbers inside the window
    pub fn lost(&self) -> usize {
        self.received[..self.len].count_zeros()
    }

    /// NACK fields covering every gap in the window.
    ///
    /// Each field starts at a missing packet and covers the 16 that follow it.
    pub fn build_nack_fields(&self) -> Vec<NackField> {
        let Some(first) = self.first else {
            return Vec::new();
        };

        let mut fields = Vec::new();
        let mut current: Option<u32> = None;
        let mut mask = 0u16;
        let mut bits = 0;

        for (i, seen) in self.received[..self.len].iter().by_vals().enumerate() {
            match current {
                Some(pid) => {
                    if !seen {
                        mask |= 1 << bits;
                    }
                    bits += 1;
                    if bits == 16 {
                        fields.push(NackField::new(pid as u16, mask));
                        current = None;
                        mask = 0;
                        bits = 0;
                    }
                }
                None if !seen => current = Some(first + i as u32),
                None => {}
            }
        }

        if let Some(pid) = current {
            fields.push(NackField::new(pid as u16, mask));
        }

        fields
    }

    /// Forget everything, the next observation starts a new window
    pub fn reset(&mut self) {
        self.received.fill(false);
        self.first = None;
        self.len = 0;
        self.highest = None;
        self.last_gap = 0;
    }
}

impl Default for LossTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LOSS_WINDOW)
    }
}

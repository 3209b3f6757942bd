//! Packet buffers
//!
//! - `jitter`: receive-side reordering buffer with bounded wait
//! - `retransmission`: send-side store answering NACKs

pub mod jitter;
pub mod retransmission;

pub use jitter::{JitterBuffer, JitterBufferConfig, JitterBufferStats, JitterState};
pub use retransmission::{Resend, RetransmissionCache, RtxConfig};

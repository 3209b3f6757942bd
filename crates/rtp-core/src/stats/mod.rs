//! Receive-side loss tracking and round-trip-time estimation

pub mod loss;
pub mod rtt;

pub use loss::{LossTracker, DEFAULT_LOSS_WINDOW};
pub use rtt::RttEstimator;

//! Eviction policy.
//!
//! - [`ClockReplacer`] - second-chance clock over the frame array

mod clock;

pub use clock::ClockReplacer;

//! System timing.
//!
//! `#[profile]` and [`crate::profile_log!`] only emit code under the
//! `perf_stats` feature.

pub use apiary_macros::profile;

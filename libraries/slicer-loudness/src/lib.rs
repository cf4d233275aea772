//! Level metering for the silence slicer
//!
//! This crate provides the metering stage of the pipeline: a per-interval,
//! per-channel level meter emitting [`LoudnessReport`]s at a fixed cadence of
//! stream time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────────┐
//! │ Audio Block │ ──► │  LevelMeter  │ ──► │ LoudnessReport* │ ──► control thread
//! └─────────────┘     └──────────────┘     └─────────────────┘
//!        │
//!        └──────────────────────────────────► (unchanged) downstream stages
//! ```
//!
//! The meter only observes samples; it never modifies them.
//!
//! # Example
//!
//! ```ignore
//! use slicer_loudness::{LevelMeter, LevelSettings};
//! use slicer_core::AudioFormat;
//!
//! let mut meter = LevelMeter::new(AudioFormat::float32(44100, 2), LevelSettings::default())?;
//! for report in meter.process(&interleaved_samples)? {
//!     println!("{}: {:.1} dB", report.end_time, report.channels[0].rms_db);
//! }
//! ```
//!
//! [`LoudnessReport`]: slicer_core::LoudnessReport

#![forbid(unsafe_code)]

mod error;
mod level;

pub use error::{LoudnessError, Result};
pub use level::{LevelMeter, LevelSettings};

/// Lowest level ever reported, in dB. Digital silence is clamped here so
/// reports stay finite and serializable.
pub const SILENCE_FLOOR_DB: f64 = -120.0;

/// Convert a linear amplitude ratio to dB
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    20.0 * linear.log10()
}

/// Convert dB to a linear amplitude ratio
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

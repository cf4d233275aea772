//! Slicer Core
//!
//! Platform-agnostic types, traits, and error handling shared by every stage of
//! the silence slicer.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Stream Types**: `ClockTime`, `AudioFormat`, `AudioBuffer`
//! - **Measurement Contract**: `LoudnessReport` / `ChannelLevel`, the periodic
//!   report emitted by the level meter and consumed by the slice heuristic
//! - **Core Traits**: `AudioSource`, the decode stage contract
//! - **Error Handling**: Unified `SlicerError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use slicer_core::{ChannelLevel, ClockTime, LoudnessReport};
//! use std::time::Duration;
//!
//! let report = LoudnessReport::new(
//!     ClockTime::from_duration(Duration::from_millis(20)),
//!     vec![ChannelLevel::new(-42.0, -30.0, -28.5)],
//! );
//! assert_eq!(report.channel_count(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SlicerError};
pub use traits::AudioSource;
pub use types::{AudioBuffer, AudioFormat, ChannelLevel, ClockTime, LoudnessReport, SampleRate};

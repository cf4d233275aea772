//! Slicer Pipeline - Silence-triggered slicing
//!
//! Splits a continuous audio stream into numbered files at silent moments,
//! without dropping or duplicating a single frame at the boundaries.
//!
//! This crate provides:
//! - The silence heuristic (threshold + minimum slice length)
//! - A sink factory handing out gapless, never-reused output names
//! - A suspend point that holds data flow while the output is swapped
//! - The controller state machine serializing cut requests
//! - The streaming thread and the control loop that drive it all
//!
//! # Architecture
//!
//! ```text
//!                 streaming thread                            control thread
//! ┌────────┐   ┌─────┐   ┌──────────┐   ┌──────────┐   ┌───────┐
//! │ source │─►│ mix │─►│ resample │─►│ dynamics │─►│ meter │── LoudnessReport ──► ControlLoop
//! └────────┘   └─────┘   └──────────┘   └──────────┘   └───┬───┘                       │
//!                                                          │                    SliceHeuristic
//!                                                   ┌──────▼───────┐                   │
//!                                                   │ SuspendPoint │◄── request_cut ───┘
//!                                                   └──────┬───────┘   (PipelineController)
//!                                                   ┌──────▼───────┐
//!                                                   │ OutputBranch │ WavEncoder ─► {n}.wav
//!                                                   └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use slicer_audio::SymphoniaSource;
//! use slicer_pipeline::{Slicer, SlicerConfig};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SlicerConfig {
//!     output_pattern: "/recordings/take-{n}.wav".to_string(),
//!     ..SlicerConfig::default()
//! };
//!
//! let source = SymphoniaSource::open(Path::new("/recordings/session.flac"))?;
//! let handle = Slicer::new(config, Box::new(source))
//!     .with_output_format(Some(1), None)
//!     .start()?;
//!
//! let summary = handle.wait()?;
//! for slice in &summary.slices {
//!     println!("{} {} frames", slice.location, slice.frames);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod branch;
mod config;
mod control;
mod controller;
mod error;
mod heuristic;
mod sink;
mod slicer;
mod state;
mod streaming;
mod suspend;

pub use branch::{DrainCallback, DrainedSlice, OutputBranch};
pub use config::{LevelConfig, SlicerConfig};
pub use control::{ControlLoop, ReportOutcome, RunSummary};
pub use controller::PipelineController;
pub use error::{PipelineError, Result};
pub use heuristic::{evaluate, ChannelAggregate, CutDecision, SliceHeuristic};
pub use sink::{
    FileSinkFactory, MemorySinkFactory, MemoryStore, SinkFactory, SinkHandle, SliceSink,
    SEQUENCE_PLACEHOLDER,
};
pub use slicer::{Slicer, SlicerHandle, StopHandle};
pub use state::{SlicePhase, SliceRecord, SliceState};
pub use streaming::{BusMessage, BUS_CAPACITY};
pub use suspend::{BlockHook, ReleaseHook, SuspendPoint};

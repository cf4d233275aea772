//! Slicer Audio
//!
//! The signal stages of the slicing pipeline, in stream order:
//!
//! ```text
//! SymphoniaSource ─► ChannelMixer ─► Resampler ─► EffectChain ─► (meter) ─► WavEncoder
//!   decode            up/downmix      rubato       compressor,                hound
//!                                                  gain
//! ```
//!
//! Every stage exchanges interleaved `f32` samples.
//!
//! # Example: Decoding Audio
//!
//! ```rust,no_run
//! use slicer_audio::SymphoniaSource;
//! use slicer_core::AudioSource;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut source = SymphoniaSource::open(Path::new("/recordings/session.wav"))?;
//! while let Some(block) = source.read_block(1024)? {
//!     println!("{} frames at {} Hz", block.frames(), block.format.sample_rate.as_hz());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Using Effects
//!
//! ```rust
//! use slicer_audio::effects::{Compressor, EffectChain, Gain};
//!
//! let mut chain = EffectChain::new();
//! chain.add_effect(Box::new(Compressor::new()));
//! chain.add_effect(Box::new(Gain::new(12.0)));
//!
//! let mut buffer = vec![0.0; 1024]; // Mono samples
//! chain.process(&mut buffer, 1, 44100);
//! ```

mod convert;
mod decoder;
pub mod effects;
mod encoder;
mod error;
pub mod resampling;

pub use convert::ChannelMixer;
pub use decoder::SymphoniaSource;
pub use encoder::{SampleEncoding, WavEncoder};
pub use error::{AudioError, Result};
pub use resampling::{Resampler, ResamplingQuality};

/// Core traits for the slicer
use crate::error::Result;
use crate::types::{AudioBuffer, AudioFormat};
use std::time::Duration;

/// Decode stage contract
///
/// Implementers produce interleaved f32 blocks in stream order. The pipeline
/// pulls blocks on its streaming thread until `read_block` returns `Ok(None)`.
pub trait AudioSource: Send {
    /// Format of every block this source produces
    fn format(&self) -> AudioFormat;

    /// Read the next block of at most `max_frames` frames
    ///
    /// Returns `None` at end of stream. Blocks may be shorter than `max_frames`
    /// but never empty.
    ///
    /// # Errors
    /// Returns an error if the underlying container or codec fails
    fn read_block(&mut self, max_frames: usize) -> Result<Option<AudioBuffer>>;

    /// Total stream duration, if the container knows it
    fn duration(&self) -> Option<Duration> {
        None
    }
}

mod audio;
mod clock;
mod report;

pub use audio::{AudioBuffer, AudioFormat, SampleRate};
pub use clock::ClockTime;
pub use report::{ChannelLevel, LoudnessReport};

//! Interval level meter
//!
//! Accumulates interleaved f32 samples and emits one [`LoudnessReport`] per
//! completed interval. Each channel reports:
//!
//! - `rms_db`: `10 * log10(mean(x²))` over the interval
//! - `peak_db`: `10 * log10(max(x²))` over the interval
//! - `decay_db`: a peak that is held for `peak_ttl`, then falls off at
//!   `peak_falloff_db` per second, never dropping below the current peak
//!
//! Intervals are counted in frames, so a single interval may span several
//! input blocks and a single block may complete several intervals. A trailing
//! partial interval at end of stream produces no report.

use crate::error::{LoudnessError, Result};
use crate::SILENCE_FLOOR_DB;
use slicer_core::{AudioFormat, ChannelLevel, ClockTime, LoudnessReport};
use std::time::Duration;

const MAX_SAMPLE_RATE: u32 = 1_000_000;
const MAX_CHANNELS: u16 = 8;

/// Metering cadence and peak decay behaviour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSettings {
    /// Length of one measurement interval
    pub interval: Duration,
    /// How long a decaying peak is held before it starts falling
    pub peak_ttl: Duration,
    /// Fall-off rate of the decaying peak, in dB per second
    pub peak_falloff_db: f64,
}

impl Default for LevelSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(20),
            peak_ttl: Duration::from_millis(50),
            peak_falloff_db: 24.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum_sq: f64,
    peak_sq: f64,
}

#[derive(Debug, Clone, Copy)]
struct DecayState {
    base_db: f64,
    current_db: f64,
    age: Duration,
}

impl DecayState {
    fn new() -> Self {
        Self {
            base_db: SILENCE_FLOOR_DB,
            current_db: SILENCE_FLOOR_DB,
            age: Duration::ZERO,
        }
    }

    fn update(&mut self, peak_db: f64, interval: Duration, settings: &LevelSettings) -> f64 {
        if peak_db >= self.current_db {
            self.base_db = peak_db;
            self.current_db = peak_db;
            self.age = Duration::ZERO;
            return self.current_db;
        }

        self.age += interval;
        if self.age > settings.peak_ttl {
            let falling = (self.age - settings.peak_ttl).as_secs_f64();
            let decayed = self.base_db - settings.peak_falloff_db * falling;
            self.current_db = decayed.max(peak_db).max(SILENCE_FLOOR_DB);
        }
        self.current_db
    }
}

/// Per-channel interval level meter
#[derive(Debug)]
pub struct LevelMeter {
    format: AudioFormat,
    settings: LevelSettings,
    interval_frames: u64,
    frames_in_interval: u64,
    frames_total: u64,
    accumulators: Vec<Accumulator>,
    decay: Vec<DecayState>,
}

impl LevelMeter {
    /// Create a meter for a stream of the given format
    pub fn new(format: AudioFormat, settings: LevelSettings) -> Result<Self> {
        let rate = format.sample_rate.as_hz();
        if rate == 0 || rate > MAX_SAMPLE_RATE {
            return Err(LoudnessError::InvalidSampleRate(rate));
        }
        if format.channels == 0 || format.channels > MAX_CHANNELS {
            return Err(LoudnessError::InvalidChannelCount(u32::from(format.channels)));
        }

        let interval_frames = format.frames_for(settings.interval);
        if interval_frames == 0 {
            return Err(LoudnessError::InvalidInterval(settings.interval));
        }

        let channels = usize::from(format.channels);
        tracing::debug!(
            sample_rate = rate,
            channels,
            interval_frames,
            "Level meter configured"
        );

        Ok(Self {
            format,
            settings,
            interval_frames,
            frames_in_interval: 0,
            frames_total: 0,
            accumulators: vec![Accumulator::default(); channels],
            decay: vec![DecayState::new(); channels],
        })
    }

    /// Format the meter was configured for
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Settings the meter was configured with
    pub fn settings(&self) -> &LevelSettings {
        &self.settings
    }

    /// Frames per measurement interval
    pub fn interval_frames(&self) -> u64 {
        self.interval_frames
    }

    /// Stream time of everything metered so far
    pub fn position(&self) -> ClockTime {
        ClockTime::from_frames(self.frames_total, self.format.sample_rate.as_hz())
    }

    /// Meter one block of interleaved samples
    ///
    /// Returns the reports for every interval completed by this block, in
    /// stream order. The samples themselves are left untouched.
    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<LoudnessReport>> {
        let channels = self.accumulators.len();
        if samples.len() % channels != 0 {
            return Err(LoudnessError::MisalignedBuffer {
                samples: samples.len(),
                channels,
            });
        }

        let mut reports = Vec::new();
        for frame in samples.chunks_exact(channels) {
            for (acc, &sample) in self.accumulators.iter_mut().zip(frame) {
                let sq = f64::from(sample) * f64::from(sample);
                acc.sum_sq += sq;
                if sq > acc.peak_sq || sq.is_nan() {
                    acc.peak_sq = sq;
                }
            }

            self.frames_in_interval += 1;
            self.frames_total += 1;

            if self.frames_in_interval == self.interval_frames {
                reports.push(self.emit());
            }
        }

        Ok(reports)
    }

    /// Discard any partial interval and all decay state
    pub fn reset(&mut self) {
        self.frames_in_interval = 0;
        self.frames_total = 0;
        self.accumulators.fill(Accumulator::default());
        self.decay.fill(DecayState::new());
    }

    fn emit(&mut self) -> LoudnessReport {
        let frames = self.frames_in_interval as f64;
        let interval = ClockTime::from_frames(self.interval_frames, self.format.sample_rate.as_hz())
            .as_duration();

        let channels = self
            .accumulators
            .iter_mut()
            .zip(self.decay.iter_mut())
            .map(|(acc, decay)| {
                let rms_db = power_to_db(acc.sum_sq / frames);
                let peak_db = power_to_db(acc.peak_sq);
                let decay_db = decay.update(peak_db, interval, &self.settings);
                *acc = Accumulator::default();
                ChannelLevel::new(rms_db, peak_db, decay_db)
            })
            .collect();

        self.frames_in_interval = 0;
        let end_time = self.position();
        tracing::trace!(%end_time, "Level report");
        LoudnessReport::new(end_time, channels)
    }
}

/// NaN power stays NaN; only finite power is floored
fn power_to_db(power: f64) -> f64 {
    if power.is_nan() {
        return f64::NAN;
    }
    if power <= 0.0 {
        return SILENCE_FLOOR_DB;
    }
    (10.0 * power.log10()).max(SILENCE_FLOOR_DB)
}

/// Fixed gain stage
use super::chain::AudioEffect;

/// Default gain applied after compression, in dB
pub const DEFAULT_GAIN_DB: f32 = 12.0;

/// Multiplies every sample by a fixed gain
///
/// No clipping is applied: float output may exceed full scale and is left
/// for the encoder to handle.
pub struct Gain {
    gain_db: f32,
    linear: f32,
    enabled: bool,
}

impl Gain {
    /// Create a gain stage of `gain_db` decibels
    pub fn new(gain_db: f32) -> Self {
        Self {
            gain_db,
            linear: 10.0_f32.powf(gain_db / 20.0),
            enabled: true,
        }
    }

    /// Gain in dB
    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    /// Change the gain
    pub fn set_gain_db(&mut self, gain_db: f32) {
        *self = Self {
            enabled: self.enabled,
            ..Self::new(gain_db)
        };
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(DEFAULT_GAIN_DB)
    }
}

impl AudioEffect for Gain {
    fn process(&mut self, buffer: &mut [f32], _channels: usize, _sample_rate: u32) {
        if !self.enabled {
            return;
        }
        for sample in buffer.iter_mut() {
            *sample *= self.linear;
        }
    }

    fn reset(&mut self) {}

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Gain"
    }
}

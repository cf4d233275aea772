/// Dynamic Range Compressor
///
/// Attenuates signal above a threshold so quiet passages sit closer to loud
/// ones before metering.
use super::chain::AudioEffect;

const NOISE_FLOOR_DB: f32 = -120.0;

/// Compressor settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    /// Threshold in dB (-60 to 0)
    pub threshold_db: f32,

    /// Ratio (1.0 to 20.0), e.g. 1.8 means 1.8:1
    pub ratio: f32,

    /// Attack time in milliseconds (0.1 to 100)
    pub attack_ms: f32,

    /// Release time in milliseconds (10 to 1000)
    pub release_ms: f32,

    /// Knee width in dB (0 to 12, 0 = hard knee)
    pub knee_db: f32,

    /// Makeup gain in dB (0 to 24)
    pub makeup_gain_db: f32,
}

impl CompressorSettings {
    /// Default slicing settings
    /// - Threshold: -24 dB
    /// - Ratio: 1.8:1
    /// - Attack: 5 ms
    /// - Release: 50 ms
    /// - Soft knee: 6 dB
    /// - Makeup gain: 0 dB
    pub fn new() -> Self {
        Self {
            threshold_db: -24.0,
            ratio: 1.8,
            attack_ms: 5.0,
            release_ms: 50.0,
            knee_db: 6.0,
            makeup_gain_db: 0.0,
        }
    }

    /// Clamp settings to safe ranges
    pub fn validate(&mut self) {
        self.threshold_db = self.threshold_db.clamp(-60.0, 0.0);
        self.ratio = self.ratio.clamp(1.0, 20.0);
        self.attack_ms = self.attack_ms.clamp(0.1, 100.0);
        self.release_ms = self.release_ms.clamp(10.0, 1000.0);
        self.knee_db = self.knee_db.clamp(0.0, 12.0);
        self.makeup_gain_db = self.makeup_gain_db.clamp(0.0, 24.0);
    }
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Dynamic Range Compressor
///
/// Two-stage design:
/// 1. Peak level detection with instant attack and a fixed 50 ms release,
///    so the level holds across waveform cycles
/// 2. Gain smoothing with the configured attack/release
///
/// Detection is linked: the loudest channel of each frame drives one gain
/// applied to every channel.
pub struct Compressor {
    settings: CompressorSettings,
    enabled: bool,

    peak_level_db: f32,
    gain_reduction_db: f32,

    peak_release_coeff: f32,
    gr_attack_coeff: f32,
    gr_release_coeff: f32,
    makeup_gain_linear: f32,

    sample_rate: u32,
    needs_update: bool,
}

impl Compressor {
    /// Create a new compressor with default settings
    pub fn new() -> Self {
        Self::with_settings(CompressorSettings::new())
    }

    /// Create compressor with specific settings
    pub fn with_settings(mut settings: CompressorSettings) -> Self {
        settings.validate();
        let mut comp = Self {
            settings,
            enabled: true,
            peak_level_db: NOISE_FLOOR_DB,
            gain_reduction_db: 0.0,
            peak_release_coeff: 0.0,
            gr_attack_coeff: 0.0,
            gr_release_coeff: 0.0,
            makeup_gain_linear: 1.0,
            sample_rate: 44100,
            needs_update: true,
        };
        comp.update_coefficients();
        comp
    }

    /// Get current settings
    pub fn settings(&self) -> CompressorSettings {
        self.settings
    }

    /// Current smoothed gain reduction in dB (zero or negative)
    pub fn gain_reduction_db(&self) -> f32 {
        self.gain_reduction_db
    }

    fn update_coefficients(&mut self) {
        if !self.needs_update {
            return;
        }

        let sr = self.sample_rate as f32;

        let peak_release_samples = 50.0 * sr / 1000.0;
        self.peak_release_coeff = (-1.0 / peak_release_samples).exp();

        // coeff = exp(-1 / (time_ms * sample_rate / 1000)), 63.2% response at the given time
        let attack_samples = self.settings.attack_ms * sr / 1000.0;
        let release_samples = self.settings.release_ms * sr / 1000.0;
        self.gr_attack_coeff = (-1.0 / attack_samples).exp();
        self.gr_release_coeff = (-1.0 / release_samples).exp();

        self.makeup_gain_linear = 10.0_f32.powf(self.settings.makeup_gain_db / 20.0);

        self.needs_update = false;
    }

    /// Static curve: output level in dB for an input level in dB
    #[inline]
    fn compute_output_level(&self, input_db: f32) -> f32 {
        let threshold = self.settings.threshold_db;
        let ratio = self.settings.ratio;
        let knee = self.settings.knee_db;

        if knee <= 0.0 {
            if input_db <= threshold {
                input_db
            } else {
                threshold + (input_db - threshold) / ratio
            }
        } else {
            let half_knee = knee / 2.0;
            let knee_start = threshold - half_knee;
            let knee_end = threshold + half_knee;

            if input_db <= knee_start {
                input_db
            } else if input_db >= knee_end {
                threshold + (input_db - threshold) / ratio
            } else {
                // Quadratic transition across the knee
                let x = input_db - knee_start;
                let slope_change = (1.0 - 1.0 / ratio) / (2.0 * knee);
                input_db - slope_change * x * x
            }
        }
    }

    #[inline]
    fn update_peak_level(&mut self, input_db: f32) {
        if input_db > self.peak_level_db {
            self.peak_level_db = input_db;
        } else {
            // Decay toward the floor, not toward the input: input hits -inf at zero crossings
            self.peak_level_db = self.peak_release_coeff * (self.peak_level_db - NOISE_FLOOR_DB)
                + NOISE_FLOOR_DB;
        }
    }

    #[inline]
    fn smooth_gain_reduction(&mut self, target_gr_db: f32) {
        let coeff = if target_gr_db < self.gain_reduction_db {
            self.gr_attack_coeff
        } else {
            self.gr_release_coeff
        };

        self.gain_reduction_db = coeff * self.gain_reduction_db + (1.0 - coeff) * target_gr_db;
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEffect for Compressor {
    fn process(&mut self, buffer: &mut [f32], channels: usize, sample_rate: u32) {
        if !self.enabled || channels == 0 {
            return;
        }

        if self.sample_rate != sample_rate {
            self.sample_rate = sample_rate;
            self.needs_update = true;
        }
        self.update_coefficients();

        for frame in buffer.chunks_exact_mut(channels) {
            let max_sample = frame.iter().fold(0.0f32, |m, s| m.max(s.abs()));

            let input_db = if max_sample > 1e-10 {
                20.0 * max_sample.log10()
            } else {
                -200.0
            };

            self.update_peak_level(input_db);
            let target_gr_db = self.compute_output_level(self.peak_level_db) - self.peak_level_db;
            self.smooth_gain_reduction(target_gr_db);

            let gain = 10.0_f32.powf(self.gain_reduction_db / 20.0) * self.makeup_gain_linear;
            for sample in frame.iter_mut() {
                *sample *= gain;
            }
        }
    }

    fn reset(&mut self) {
        self.peak_level_db = NOISE_FLOOR_DB;
        self.gain_reduction_db = 0.0;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Compressor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::tests::{generate_sine, peak};

    #[test]
    fn default_settings() {
        let settings = CompressorSettings::default();
        assert_eq!(settings.threshold_db, -24.0);
        assert_eq!(settings.ratio, 1.8);
        assert_eq!(settings.knee_db, 6.0);
    }

    #[test]
    fn settings_validation() {
        let mut settings = CompressorSettings {
            threshold_db: -100.0,
            ratio: 50.0,
            attack_ms: 0.01,
            release_ms: 5000.0,
            knee_db: 20.0,
            makeup_gain_db: 50.0,
        };

        settings.validate();

        assert_eq!(settings.threshold_db, -60.0);
        assert_eq!(settings.ratio, 20.0);
        assert_eq!(settings.attack_ms, 0.1);
        assert_eq!(settings.release_ms, 1000.0);
        assert_eq!(settings.knee_db, 12.0);
        assert_eq!(settings.makeup_gain_db, 24.0);
    }

    #[test]
    fn static_curve() {
        let comp = Compressor::with_settings(CompressorSettings {
            knee_db: 0.0,
            ratio: 2.0,
            threshold_db: -20.0,
            ..CompressorSettings::default()
        });

        assert_eq!(comp.compute_output_level(-30.0), -30.0);
        assert_eq!(comp.compute_output_level(-10.0), -15.0);
    }

    #[test]
    fn soft_knee_is_continuous() {
        let comp = Compressor::new();
        // Knee spans -27..-21 dB
        let below = comp.compute_output_level(-27.0);
        let above = comp.compute_output_level(-21.0);
        assert!((below - (-27.0)).abs() < 1e-4);
        assert!((above - (-24.0 + 3.0 / 1.8)).abs() < 1e-4);
    }

    #[test]
    fn loud_signal_is_reduced() {
        let mut comp = Compressor::new();
        let mut buffer = generate_sine(1000.0, 44100, 0.5, 1.0, 2);
        comp.process(&mut buffer, 2, 44100);

        let tail = &buffer[buffer.len() / 2..];
        assert!(peak(tail) < 0.9, "peak {}", peak(tail));
        assert!(comp.gain_reduction_db() < -1.0);
    }

    #[test]
    fn quiet_signal_untouched() {
        let mut comp = Compressor::new();
        let original = generate_sine(1000.0, 44100, 0.2, 0.01, 1);
        let mut buffer = original.clone();
        comp.process(&mut buffer, 1, 44100);

        for (a, b) in original.iter().zip(&buffer) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn linked_channels_share_gain() {
        let mut comp = Compressor::new();
        // Loud left, quiet right: both must be scaled by the same factor
        let mut buffer: Vec<f32> = (0..4410).flat_map(|_| [0.9f32, 0.1]).collect();
        comp.process(&mut buffer, 2, 44100);

        for frame in buffer.chunks_exact(2) {
            assert!((frame[0] / frame[1] - 9.0).abs() < 1e-3);
        }
    }

    #[test]
    fn reset_clears_state() {
        let mut comp = Compressor::new();
        let mut buffer = generate_sine(1000.0, 44100, 0.2, 1.0, 1);
        comp.process(&mut buffer, 1, 44100);
        comp.reset();
        assert_eq!(comp.gain_reduction_db(), 0.0);
    }
}

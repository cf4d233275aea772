/// Effect chain for processing audio
///
/// Effects are processed in order on interleaved f32 samples.

/// Trait for audio effects that can be chained together
///
/// Implementations must not allocate in `process()`; it runs on the
/// streaming thread for every block.
pub trait AudioEffect: Send {
    /// Process an interleaved buffer in-place
    ///
    /// # Arguments
    /// * `buffer` - Interleaved samples, `channels` per frame
    /// * `channels` - Number of interleaved channels
    /// * `sample_rate` - Sample rate in Hz
    fn process(&mut self, buffer: &mut [f32], channels: usize, sample_rate: u32);

    /// Reset effect state
    fn reset(&mut self);

    /// Enable/disable the effect
    fn set_enabled(&mut self, enabled: bool);

    /// Check if effect is enabled
    fn is_enabled(&self) -> bool;

    /// Get effect name (for debugging)
    fn name(&self) -> &str;
}

/// Chain of audio effects processed in order
pub struct EffectChain {
    effects: Vec<Box<dyn AudioEffect>>,
}

impl EffectChain {
    /// Create a new empty effect chain
    pub fn new() -> Self {
        Self {
            effects: Vec::new(),
        }
    }

    /// Add an effect to the end of the chain
    pub fn add_effect(&mut self, effect: Box<dyn AudioEffect>) {
        self.effects.push(effect);
    }

    /// Process audio through every enabled effect
    pub fn process(&mut self, buffer: &mut [f32], channels: usize, sample_rate: u32) {
        for effect in &mut self.effects {
            if effect.is_enabled() {
                effect.process(buffer, channels, sample_rate);
            }
        }
    }

    /// Reset all effects in the chain
    pub fn reset(&mut self) {
        for effect in &mut self.effects {
            effect.reset();
        }
    }

    /// Get number of effects in chain
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Check if chain is empty
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Names of the effects, in processing order
    pub fn names(&self) -> Vec<&str> {
        self.effects.iter().map(|e| e.name()).collect()
    }
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::new()
    }
}

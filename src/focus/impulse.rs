//! Synthetic reverb impulse responses
//!
//! The convolver is fed a noise burst shaped by a power-law decay:
//!
//! `h[i] = (r * 2 - 1) * (1 - i / len)^decay`, `len = sample_rate * duration`
//!
//! Left and right carry identical content (mono-as-stereo).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Two-channel impulse buffer for a convolver node
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    sample_rate: f32,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl ImpulseResponse {
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Length in frames
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Length in seconds
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate > 0.0 {
            self.left.len() as f32 / self.sample_rate
        } else {
            0.0
        }
    }

    /// Channel data; 0 is left, anything else is right
    pub fn channel(&self, index: usize) -> &[f32] {
        if index == 0 {
            &self.left
        } else {
            &self.right
        }
    }

    pub fn num_channels(&self) -> usize {
        2
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.left.iter().fold(0.0_f32, |peak, s| peak.max(s.abs()))
    }
}

/// Noise source for impulse synthesis
#[derive(Debug, Clone)]
pub struct ImpulseGenerator {
    rng: StdRng,
}

impl Default for ImpulseGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ImpulseGenerator {
    /// Generator seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator (for tests)
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Synthesize a decaying noise burst
    ///
    /// # Arguments
    /// * `sample_rate` - Context sample rate in Hz
    /// * `duration` - Burst length in seconds
    /// * `decay` - Exponent of the `(1 - t)` envelope; larger is a faster fade
    pub fn generate(&mut self, sample_rate: f32, duration: f32, decay: f32) -> ImpulseResponse {
        let length = if sample_rate > 0.0 && duration > 0.0 {
            (sample_rate * duration) as usize
        } else {
            0
        };

        let mut left = Vec::with_capacity(length);
        for i in 0..length {
            let envelope = (1.0 - i as f32 / length as f32).powf(decay);
            let noise = self.rng.gen::<f32>() * 2.0 - 1.0;
            left.push(noise * envelope);
        }
        let right = left.clone();

        ImpulseResponse {
            sample_rate,
            left,
            right,
        }
    }
}

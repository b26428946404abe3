//! Gain/volume control

use dasp_graph::{Buffer, Input};

use super::{sum_inputs, BlockContext, Unit};

/// Scales the sum of its inputs.
pub struct Gain {
    gain: f32,
    /// Smoothing to prevent clicks on gain changes
    smoothed_gain: f32,
    /// Smoothing coefficient (0.0 = instant, 1.0 = no change)
    smooth_coeff: f32,
}

impl Gain {
    pub fn new(gain: f32) -> Self {
        Self {
            gain,
            smoothed_gain: gain,
            smooth_coeff: 0.995, // ~4ms at 48kHz
        }
    }

    /// Reach ~63% of a new target after `ms` milliseconds.
    pub fn with_smoothing_ms(mut self, ms: f32, sample_rate: u32) -> Self {
        let samples = (ms / 1000.0) * sample_rate as f32;
        self.smooth_coeff = (-1.0 / samples).exp();
        self
    }

    pub fn without_smoothing(mut self) -> Self {
        self.smooth_coeff = 0.0;
        self
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl Unit for Gain {
    fn process(&mut self, _ctx: &BlockContext, inputs: &[Input], output: &mut [Buffer]) {
        sum_inputs(inputs, output);
        let Some(buffer) = output.first_mut() else {
            return;
        };

        let target = self.gain;
        let coeff = self.smooth_coeff;
        let mut gain = self.smoothed_gain;
        for sample in buffer.iter_mut() {
            gain = target + coeff * (gain - target);
            *sample *= gain;
        }
        self.smoothed_gain = gain;
    }

    fn set_control(&mut self, name: &str, value: f32) -> bool {
        if name != "gain" {
            return false;
        }
        self.gain = value;
        true
    }
}

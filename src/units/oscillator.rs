//! Periodic waveform oscillator

use core::f32::consts::TAU;

use dasp_graph::{Buffer, Input};

use super::{BlockContext, Unit};
use crate::param::Waveform;

/// A mono oscillator. Ignores its inputs.
pub struct Oscillator {
    waveform: Waveform,
    frequency: f32,
    /// Pitch offset in cents.
    detune: f32,
    phase: f32,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f32, detune: f32) -> Self {
        Self {
            waveform,
            frequency: frequency.max(0.0),
            detune,
            phase: 0.0,
        }
    }

    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Frequency after detune is applied.
    #[inline]
    pub fn effective_frequency(&self) -> f32 {
        self.frequency * (self.detune / 1200.0).exp2()
    }

    #[inline]
    fn sample(&self) -> f32 {
        let phase = self.phase;
        match self.waveform {
            Waveform::Sine => (phase * TAU).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

impl Unit for Oscillator {
    fn process(&mut self, ctx: &BlockContext, _inputs: &[Input], output: &mut [Buffer]) {
        let Some(buffer) = output.first_mut() else {
            return;
        };

        let phase_inc = self.effective_frequency() / ctx.sample_rate as f32;
        for sample in buffer.iter_mut() {
            *sample = self.sample();
            self.phase += phase_inc;
            self.phase -= self.phase.floor();
        }
    }

    fn set_control(&mut self, name: &str, value: f32) -> bool {
        match name {
            "frequency" => self.frequency = value.max(0.0),
            "detune" => self.detune = value,
            _ => return false,
        }
        true
    }
}

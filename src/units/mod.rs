//! Processing units rendered by the [`DaspBackend`](crate::backend::dasp::DaspBackend).
//!
//! Every unit is mono: one 64-frame [`Buffer`] out per block, all audio
//! inputs summed. Per-kind behaviour:
//!
//! - [`Oscillator`] - periodic waveform, `frequency`/`detune` automatable
//! - [`Gain`] - scales the summed input, `gain` automatable with smoothing
//! - [`Mix`] - passes the summed input through (ports and the Destination)
//! - [`Bus`] - terminal unit writing interleaved frames to a ring buffer

pub mod bus;
pub mod gain;
pub mod mix;
pub mod oscillator;

pub use bus::Bus;
pub use gain::Gain;
pub use mix::Mix;
pub use oscillator::Oscillator;

use dasp_graph::{Buffer, Input, Node as _};
use tracing::warn;

use crate::node::NodeType;
use crate::param::{Parameters, Waveform};

/// Context available while rendering one block
#[derive(Clone, Copy, Debug)]
pub struct BlockContext {
    pub sample_rate: u32,
    /// Start of the block, in seconds.
    pub time: f64,
}

#[enum_delegate::register]
pub trait Unit {
    /// Render one block. `output` holds a single buffer.
    fn process(&mut self, ctx: &BlockContext, inputs: &[Input], output: &mut [Buffer]);

    /// Set an automatable control. Returns `false` for unknown names.
    fn set_control(&mut self, name: &str, value: f32) -> bool;
}

#[enum_delegate::implement(Unit)]
pub enum AnyUnit {
    Oscillator(Oscillator),
    Gain(Gain),
    Mix(Mix),
    Bus(Bus),
}

impl AnyUnit {
    /// The unit rendering a node of `kind`. Nested graphs have none.
    ///
    /// Values missing from `params` fall back to the declared defaults of
    /// `kind`.
    pub fn for_node(kind: NodeType, params: &Parameters) -> Option<Self> {
        let declared = kind.declared_parameters();
        let number = |name: &str| {
            params
                .number(name)
                .or_else(|| declared.number(name))
                .unwrap_or_default()
        };

        let unit = match kind {
            NodeType::Oscillator => {
                let waveform = match params.text("type").or_else(|| declared.text("type")) {
                    Some(name) => name.parse().unwrap_or_else(|err: String| {
                        warn!(%err, "falling back to a sine wave");
                        Waveform::Sine
                    }),
                    None => Waveform::Sine,
                };
                Oscillator::new(waveform, number("frequency"), number("detune")).into()
            }
            NodeType::Gain => Gain::new(number("gain")).into(),
            NodeType::Input | NodeType::Output | NodeType::Destination => Mix.into(),
            NodeType::Graph => return None,
        };
        Some(unit)
    }
}

/// Silence `output` and add every input into it.
pub(crate) fn sum_inputs(inputs: &[Input], output: &mut [Buffer]) {
    dasp_graph::node::Sum.process(inputs, output);
}

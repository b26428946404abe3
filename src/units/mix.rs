//! Passthrough mixer

use dasp_graph::{Buffer, Input};

use super::{sum_inputs, BlockContext, Unit};

/// Outputs the sum of its inputs. Renders graph ports and the Destination.
pub struct Mix;

impl Unit for Mix {
    fn process(&mut self, _ctx: &BlockContext, inputs: &[Input], output: &mut [Buffer]) {
        sum_inputs(inputs, output);
    }

    fn set_control(&mut self, _name: &str, _value: f32) -> bool {
        false
    }
}

//! Output bus - the terminal unit of the dasp backend

use dasp_graph::{Buffer, Input};
use rtrb::Producer;

use super::{sum_inputs, BlockContext, Unit};

/// Sums its inputs and pushes the block, copied to every channel and
/// interleaved, into a ring buffer.
pub struct Bus {
    producer: Producer<f32>,
    channels: usize,
}

impl Bus {
    pub fn new(producer: Producer<f32>, channels: usize) -> Self {
        Self {
            producer,
            channels: channels.max(1),
        }
    }

    /// Free sample slots in the ring buffer
    #[inline]
    pub fn available(&self) -> usize {
        self.producer.slots()
    }
}

impl Unit for Bus {
    fn process(&mut self, _ctx: &BlockContext, inputs: &[Input], output: &mut [Buffer]) {
        sum_inputs(inputs, output);
        let Some(buffer) = output.first() else {
            return;
        };

        // drop the whole block rather than write part of it
        if self.producer.slots() < buffer.len() * self.channels {
            return;
        }

        for &sample in buffer.iter() {
            for _ in 0..self.channels {
                let _ = self.producer.push(sample);
            }
        }
    }

    fn set_control(&mut self, _name: &str, _value: f32) -> bool {
        false
    }
}

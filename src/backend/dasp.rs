//! Block renderer built on `dasp_graph`
//!
//! Each backend object is one [`Unit`](crate::units::Unit) in a petgraph
//! `StableGraph`; connections are edges. Destination objects feed a bus
//! that interleaves the mix into a ring buffer, which the caller drains
//! (see [`DaspBackend::take_output`]) or hands to an audio device.

use core::cell::Cell;
use std::rc::Rc;

use dasp_graph::{Buffer, Input, NodeData, Processor};
use hashbrown::HashMap;
use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::trace;

use crate::backend::{live_controls, Backend, ConnectTarget};
use crate::error::BackendError;
use crate::id::ObjectId;
use crate::node::NodeType;
use crate::param::Parameters;
use crate::units::{AnyUnit, BlockContext, Bus, Unit};

/// Frames rendered per [`DaspBackend::process`] call.
pub const BLOCK_SIZE: usize = Buffer::LEN;

/// Settings for a [`DaspBackend`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DaspConfig {
    pub sample_rate: u32,
    /// Channels the output is interleaved into.
    pub channels: usize,
    /// Pending automation events per object.
    pub automation_queue: usize,
    /// Output ring buffer size, in samples.
    pub output_capacity: usize,
}

impl Default for DaspConfig {
    fn default() -> Self {
        Self::new(48_000)
    }
}

impl DaspConfig {
    /// Stereo output with ~100ms of buffering.
    pub fn new(sample_rate: u32) -> Self {
        let channels = 2;
        Self {
            sample_rate,
            channels,
            automation_queue: 64,
            output_capacity: output_capacity_for(sample_rate, channels),
        }
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.max(1);
        self.output_capacity = output_capacity_for(self.sample_rate, self.channels);
        self
    }

    pub fn with_automation_queue(mut self, size: usize) -> Self {
        self.automation_queue = size.max(1);
        self
    }

    pub fn with_output_capacity(mut self, samples: usize) -> Self {
        self.output_capacity = samples;
        self
    }
}

fn output_capacity_for(sample_rate: u32, channels: usize) -> usize {
    let samples = (sample_rate as usize / 10) * channels;
    samples.next_power_of_two().max(8192)
}

/// A parameter change waiting for its time.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Automation {
    control: &'static str,
    value: f32,
    at: f64,
}

/// Adapter between a unit and `dasp_graph`: applies automation that is due,
/// then renders.
struct Slot {
    unit: AnyUnit,
    automation: Option<Consumer<Automation>>,
    pending: Vec<Automation>,
    sample_rate: u32,
    frames: Rc<Cell<u64>>,
}

impl Slot {
    /// Drain the queue and apply every event due by `time`.
    ///
    /// Runs for every object each block, whether or not it reaches the bus.
    fn apply_due(&mut self, time: f64) {
        if let Some(queue) = self.automation.as_mut() {
            self.pending.extend(core::iter::from_fn(|| queue.pop().ok()));
        }
        let unit = &mut self.unit;
        self.pending.retain(|event| {
            if event.at > time {
                return true;
            }
            unit.set_control(event.control, event.value);
            false
        });
    }
}

impl dasp_graph::Node for Slot {
    fn process(&mut self, inputs: &[Input], output: &mut [Buffer]) {
        let ctx = BlockContext {
            sample_rate: self.sample_rate,
            time: seconds(self.frames.get(), self.sample_rate),
        };
        self.unit.process(&ctx, inputs, output);
    }
}

type UnitGraph = StableGraph<NodeData<Slot>, ()>;

struct Record {
    index: NodeIndex,
    kind: NodeType,
    automation: Producer<Automation>,
}

/// Renders the graphs built on it into an interleaved ring buffer.
///
/// ```
/// use patchbay::backend::dasp::{DaspBackend, DaspConfig};
///
/// let mut backend = DaspBackend::new(DaspConfig::new(44_100).with_channels(1));
/// let mut output = backend.take_output().unwrap();
/// backend.process();
/// assert_eq!(output.slots(), 64);
/// ```
pub struct DaspBackend {
    config: DaspConfig,
    graph: UnitGraph,
    processor: Processor<UnitGraph>,
    objects: HashMap<ObjectId, Record>,
    next_object: u64,
    bus: NodeIndex,
    frames: Rc<Cell<u64>>,
    output: Option<Consumer<f32>>,
}

impl DaspBackend {
    pub fn new(config: DaspConfig) -> Self {
        let (producer, consumer) = RingBuffer::new(config.output_capacity);
        let frames = Rc::new(Cell::new(0));

        let mut graph = UnitGraph::with_capacity(64, 64);
        let bus = graph.add_node(NodeData::new1(Slot {
            unit: Bus::new(producer, config.channels).into(),
            automation: None,
            pending: Vec::new(),
            sample_rate: config.sample_rate,
            frames: frames.clone(),
        }));

        Self {
            config,
            graph,
            processor: Processor::with_capacity(64),
            objects: HashMap::new(),
            next_object: 0,
            bus,
            frames,
            output: Some(consumer),
        }
    }

    pub fn config(&self) -> &DaspConfig {
        &self.config
    }

    /// The consuming end of the output ring. Can be taken once.
    pub fn take_output(&mut self) -> Option<Consumer<f32>> {
        self.output.take()
    }

    /// Live objects, not counting the output bus.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames.get()
    }

    /// Render one block of [`BLOCK_SIZE`] frames.
    pub fn process(&mut self) {
        let time = seconds(self.frames.get(), self.config.sample_rate);
        for data in self.graph.node_weights_mut() {
            data.node.apply_due(time);
        }
        self.processor.process(&mut self.graph, self.bus);
        self.frames.set(self.frames.get() + BLOCK_SIZE as u64);
    }

    fn record(&self, object: ObjectId) -> Result<&Record, BackendError> {
        self.objects
            .get(&object)
            .ok_or(BackendError::UnknownObject(object))
    }
}

impl Backend for DaspBackend {
    fn create(&mut self, kind: NodeType, params: &Parameters) -> Result<ObjectId, BackendError> {
        let unit = AnyUnit::for_node(kind, params)
            .ok_or_else(|| BackendError::rejected(format!("{} has no processing unit", kind)))?;
        let (producer, consumer) = RingBuffer::new(self.config.automation_queue);

        let index = self.graph.add_node(NodeData::new1(Slot {
            unit,
            automation: Some(consumer),
            pending: Vec::new(),
            sample_rate: self.config.sample_rate,
            frames: self.frames.clone(),
        }));
        if kind == NodeType::Destination {
            self.graph.add_edge(index, self.bus, ());
        }

        let object = ObjectId::new(self.next_object);
        self.next_object += 1;
        self.objects.insert(
            object,
            Record {
                index,
                kind,
                automation: producer,
            },
        );
        trace!(%object, ?kind, "unit created");
        Ok(object)
    }

    fn discard(&mut self, object: ObjectId) {
        if let Some(record) = self.objects.remove(&object) {
            self.graph.remove_node(record.index);
            trace!(%object, "unit discarded");
        }
    }

    fn connect(&mut self, source: ObjectId, target: ConnectTarget<'_>) -> Result<(), BackendError> {
        let to = match target {
            ConnectTarget::Input(to) => to,
            ConnectTarget::Param(_, param) => {
                return Err(BackendError::rejected(format!(
                    "parameter input '{}' is not supported",
                    param
                )))
            }
        };
        let from = self.record(source)?.index;
        let to = self.record(to)?.index;

        if self.graph.find_edge(from, to).is_some() {
            return Ok(());
        }
        if has_path_connecting(&self.graph, to, from, None) {
            return Err(BackendError::rejected("connection would create a cycle"));
        }

        self.graph.add_edge(from, to, ());
        trace!(%source, target = %target.object(), "units connected");
        Ok(())
    }

    fn has_control(&self, object: ObjectId, param: &str) -> bool {
        self.objects
            .get(&object)
            .map_or(false, |record| live_controls(record.kind).contains(&param))
    }

    fn schedule(&mut self, object: ObjectId, param: &str, value: f32, at: f64) -> Result<(), BackendError> {
        let record = self
            .objects
            .get_mut(&object)
            .ok_or(BackendError::UnknownObject(object))?;
        let control = live_controls(record.kind)
            .iter()
            .copied()
            .find(|control| *control == param)
            .ok_or_else(|| BackendError::NoControl {
                param: param.to_string(),
            })?;

        record
            .automation
            .push(Automation { control, value, at })
            .map_err(|_| BackendError::QueueFull)?;
        trace!(%object, param, value, at, "automation queued");
        Ok(())
    }

    fn current_time(&self) -> f64 {
        seconds(self.frames.get(), self.config.sample_rate)
    }
}

fn seconds(frames: u64, sample_rate: u32) -> f64 {
    frames as f64 / sample_rate as f64
}

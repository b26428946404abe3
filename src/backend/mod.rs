//! The signal processing backend seam.
//!
//! The graph engine never produces sound itself. It asks a [`Backend`] to
//! build one processing object per node, to wire objects together and to
//! automate numeric controls while audio is running. There is no explicit
//! disconnect: an object is discarded and a fresh one is built instead,
//! which drops every connection the old one had.
//!
//! Two backends ship with the crate:
//! - [`DaspBackend`](dasp::DaspBackend) renders audio block by block on
//!   top of `dasp_graph`.
//! - [`RecordingBackend`](recording::RecordingBackend) builds nothing and
//!   records every request, for tests and tooling.

pub mod dasp;
pub mod recording;

use crate::error::BackendError;
use crate::id::ObjectId;
use crate::node::NodeType;
use crate::param::Parameters;

/// Where a connection lands on the destination object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectTarget<'a> {
    /// The object's audio input.
    Input(ObjectId),
    /// A named parameter input of the object (modulation).
    Param(ObjectId, &'a str),
}

impl ConnectTarget<'_> {
    pub fn object(&self) -> ObjectId {
        match *self {
            ConnectTarget::Input(object) | ConnectTarget::Param(object, _) => object,
        }
    }
}

/// A real-time signal processing runtime driven by the graph engine.
pub trait Backend {
    /// Build a processing object for a node of `kind` from its current
    /// parameters. The object starts out unconnected.
    fn create(&mut self, kind: NodeType, params: &Parameters) -> Result<ObjectId, BackendError>;

    /// Drop an object together with all of its connections. Unknown objects
    /// are ignored.
    fn discard(&mut self, object: ObjectId);

    /// Route the output of `source` into `target`.
    fn connect(&mut self, source: ObjectId, target: ConnectTarget<'_>) -> Result<(), BackendError>;

    /// Whether `param` on `object` can be automated while running.
    fn has_control(&self, object: ObjectId, param: &str) -> bool;

    /// Set `param` on `object` to `value` at processing time `at` (seconds).
    fn schedule(&mut self, object: ObjectId, param: &str, value: f32, at: f64) -> Result<(), BackendError>;

    /// Current processing time in seconds.
    fn current_time(&self) -> f64;
}

/// Numeric parameters the bundled backends can automate for each node kind.
pub fn live_controls(kind: NodeType) -> &'static [&'static str] {
    match kind {
        NodeType::Oscillator => &["frequency", "detune"],
        NodeType::Gain => &["gain"],
        NodeType::Input | NodeType::Output | NodeType::Destination | NodeType::Graph => &[],
    }
}

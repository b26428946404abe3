//! Graph nodes.
//!
//! A [`Node`] is one processing stage: an identity, a kind, declared
//! parameters and, while it belongs to a graph, a handle to the object the
//! backend built for it. Nodes move through three states:
//!
//! - **idle**: no backend object (detached, or the backend refused to
//!   build one)
//! - **constructed**: an object built from the current parameters, not
//!   connected to anything
//! - **playing**: connected according to the graph's links
//!
//! Stopping a node throws its object away and builds a new one, so every
//! start begins from a clean, unconnected object. The graph drives these
//! transitions; see [`AudioGraph`].

use core::fmt;

use tracing::{error, trace, warn};

use crate::backend::Backend;
use crate::channel::Channel;
use crate::graph::AudioGraph;
use crate::id::{NodeId, ObjectId};
use crate::param::{ParamValue, Parameters, Update, Waveform};

/// The kind of a node, without any per-kind data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    Oscillator,
    Gain,
    /// Named entry point of a graph used as a node.
    Input,
    /// Named exit point of a graph used as a node.
    Output,
    /// The speakers.
    Destination,
    /// A graph nested inside another graph.
    Graph,
}

impl NodeType {
    pub fn name(&self) -> &'static str {
        match self {
            NodeType::Oscillator => "Oscillator",
            NodeType::Gain => "Gain",
            NodeType::Input => "Input",
            NodeType::Output => "Output",
            NodeType::Destination => "Destination",
            NodeType::Graph => "Graph",
        }
    }

    /// The parameter set a fresh node of this kind starts with.
    pub fn declared_parameters(&self) -> Parameters {
        match self {
            NodeType::Oscillator => Parameters::declare([
                ("type", Waveform::Sine.into()),
                ("frequency", ParamValue::Number(440.0)),
                ("detune", ParamValue::Number(0.0)),
            ]),
            NodeType::Gain => Parameters::declare([("gain", ParamValue::Number(0.5))]),
            NodeType::Input => Parameters::declare([("name", ParamValue::from("input"))]),
            NodeType::Output => Parameters::declare([("name", ParamValue::from("output"))]),
            NodeType::Destination | NodeType::Graph => Parameters::default(),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Editor layout position. The engine only carries it around.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug)]
enum NodeKind {
    Oscillator,
    Gain,
    Input,
    Output,
    Destination,
    Graph(Box<AudioGraph>),
}

/// Lifecycle points at which a node kind may run extra work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    BeforeStart,
    Started,
    BeforeStop,
    Stopped,
}

/// What a parameter update did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Applied {
    /// At least one value changed.
    pub changed: bool,
    /// At least one change could not be streamed to a running object.
    pub rebuild: bool,
}

/// A single processing stage in an [`AudioGraph`].
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    label: String,
    position: Position,
    params: Parameters,
    playing: bool,
    object: Option<ObjectId>,
    /// Parameters changed since `object` was built.
    stale: bool,
    param_changed: Channel<Parameters>,
}

impl Node {
    fn with_kind(kind: NodeKind) -> Self {
        let mut node = Self {
            id: NodeId::new(),
            kind,
            label: String::new(),
            position: Position::default(),
            params: Parameters::default(),
            playing: false,
            object: None,
            stale: false,
            param_changed: Channel::new(),
        };
        let node_type = node.node_type();
        node.label = node_type.name().to_string();
        node.params = node_type.declared_parameters();
        node
    }

    pub fn oscillator() -> Self {
        Self::with_kind(NodeKind::Oscillator)
    }

    pub fn gain() -> Self {
        Self::with_kind(NodeKind::Gain)
    }

    /// An entry port named `name`, for use inside a nested graph.
    pub fn input(name: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Input).with_parameters([("name", ParamValue::Text(name.into()))])
    }

    /// An exit port named `name`. Output nodes of the active graph are also
    /// what the [`Transport`](crate::Transport) routes to the speakers.
    pub fn output(name: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Output).with_parameters([("name", ParamValue::Text(name.into()))])
    }

    pub fn destination() -> Self {
        Self::with_kind(NodeKind::Destination)
    }

    /// Wrap a graph so it can be placed inside another graph. Links reach
    /// into it through its [`Input`](NodeType::Input) and
    /// [`Output`](NodeType::Output) nodes, selected by name.
    pub fn graph(inner: AudioGraph) -> Self {
        let label = inner.name().to_string();
        Self::with_kind(NodeKind::Graph(Box::new(inner))).with_label(label)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Position { x, y };
        self
    }

    pub fn with_parameters<I, K, V>(mut self, updates: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ParamValue>,
    {
        self.set_parameters(updates);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node_type(&self) -> NodeType {
        match &self.kind {
            NodeKind::Oscillator => NodeType::Oscillator,
            NodeKind::Gain => NodeType::Gain,
            NodeKind::Input => NodeType::Input,
            NodeKind::Output => NodeType::Output,
            NodeKind::Destination => NodeType::Destination,
            NodeKind::Graph(_) => NodeType::Graph,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// The live backend object, if one is built.
    pub fn object(&self) -> Option<ObjectId> {
        self.object
    }

    /// Fires once per parameter update that changed at least one value.
    pub fn param_changed(&self) -> &Channel<Parameters> {
        &self.param_changed
    }

    /// The inner graph, if this node is a nested graph.
    pub fn subgraph(&self) -> Option<&AudioGraph> {
        match &self.kind {
            NodeKind::Graph(inner) => Some(inner),
            _ => None,
        }
    }

    /// The port name of an Input or Output node.
    pub fn port_name(&self) -> Option<&str> {
        match self.kind {
            NodeKind::Input | NodeKind::Output => self.params.text("name"),
            _ => None,
        }
    }

    /// Give the node a fresh id, e.g. after duplicating a patch.
    pub fn regenerate_id(&mut self) {
        self.id = NodeId::new();
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.position = Position { x, y };
    }

    /// Change parameter values of a node that is not part of a graph.
    /// Names the node doesn't declare are ignored. Returns whether anything
    /// changed.
    pub fn set_parameters<I, K, V>(&mut self, updates: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ParamValue>,
    {
        let updates = collect_updates(updates);
        let applied = self.apply_parameters(None, &updates);
        if applied.changed {
            self.notify_parameters();
        }
        applied.changed
    }

    pub fn reset_parameters(&mut self) -> bool {
        let defaults = self.params.defaults();
        self.set_parameters(defaults)
    }

    pub fn reset_parameter(&mut self, name: &str) -> bool {
        match self.params.default_of(name).cloned() {
            Some(default) => self.set_parameters([(name, default)]),
            None => false,
        }
    }

    pub(crate) fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub(crate) fn subgraph_mut(&mut self) -> Option<&mut AudioGraph> {
        match &mut self.kind {
            NodeKind::Graph(inner) => Some(inner),
            _ => None,
        }
    }

    pub(crate) fn notify_parameters(&self) {
        self.param_changed.notify(&self.params);
    }

    /// Write `updates`, streaming numeric changes into the running object
    /// where the backend offers a control for them.
    pub(crate) fn apply_parameters<K: AsRef<str>>(
        &mut self,
        mut backend: Option<&mut dyn Backend>,
        updates: &[(K, ParamValue)],
    ) -> Applied {
        let mut applied = Applied::default();

        for (name, value) in updates {
            let name = name.as_ref();
            match self.params.write(name, value) {
                Update::Unknown => {
                    warn!(node = %self.id, param = name, "ignoring undeclared parameter");
                    continue;
                }
                Update::Unchanged => continue,
                Update::Changed => applied.changed = true,
            }

            let streamed = match (backend.as_deref_mut(), self.object, value.as_number()) {
                (Some(backend), Some(object), Some(number))
                    if self.playing && backend.has_control(object, name) =>
                {
                    let at = backend.current_time();
                    match backend.schedule(object, name, number, at) {
                        Ok(()) => true,
                        Err(err) => {
                            warn!(node = %self.id, param = name, %err, "live update refused");
                            false
                        }
                    }
                }
                _ => false,
            };

            if !streamed {
                self.stale = true;
                applied.rebuild = true;
            }
        }

        applied
    }

    /// Whether the node's object must be (re)built before it can start.
    pub(crate) fn needs_build(&self) -> bool {
        self.subgraph().is_none() && (self.object.is_none() || self.stale)
    }

    /// Replace the backend object with a fresh one built from the current
    /// parameters.
    pub(crate) fn build(&mut self, backend: &mut dyn Backend) {
        if self.subgraph().is_some() {
            return;
        }
        if let Some(old) = self.object.take() {
            backend.discard(old);
        }
        match backend.create(self.node_type(), &self.params) {
            Ok(object) => {
                trace!(node = %self.id, %object, "built");
                self.object = Some(object);
            }
            Err(err) => error!(node = %self.id, %err, "backend could not build node"),
        }
        self.stale = false;
    }

    /// Drop the backend object without building a new one.
    pub(crate) fn discard(&mut self, backend: &mut dyn Backend) {
        if let Some(object) = self.object.take() {
            backend.discard(object);
        }
    }

    pub(crate) fn hook(&mut self, phase: Phase) {
        match (&mut self.kind, phase) {
            (NodeKind::Graph(inner), Phase::BeforeStart) => inner.start(),
            (NodeKind::Graph(inner), Phase::BeforeStop) => inner.stop(),
            (_, phase) => trace!(node = %self.id, ?phase, "lifecycle"),
        }
    }
}

pub(crate) fn collect_updates<I, K, V>(updates: I) -> Vec<(K, ParamValue)>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<ParamValue>,
{
    updates
        .into_iter()
        .map(|(name, value)| (name, value.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::RecordingBackend;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn labels_default_to_the_type_name() {
        assert_eq!(Node::oscillator().label(), "Oscillator");
        assert_eq!(Node::destination().node_type(), NodeType::Destination);
    }

    #[test]
    fn ports_carry_their_name() {
        assert_eq!(Node::input("left").port_name(), Some("left"));
        assert_eq!(Node::output("mix").port_name(), Some("mix"));
        assert_eq!(Node::gain().port_name(), None);
    }

    #[test]
    fn detached_updates_keep_the_declared_key_set() {
        let mut node = Node::oscillator();
        let before: Vec<_> = node.parameters().names().collect();

        assert!(node.set_parameters([("frequency", 220.0), ("bogus", 1.0)]));
        assert_eq!(node.parameters().names().collect::<Vec<_>>(), before);
        assert_eq!(node.parameters().number("frequency"), Some(220.0));
    }

    #[test]
    fn one_notification_per_update() {
        let mut node = Node::oscillator();
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        node.param_changed().subscribe(move |_| counter.set(counter.get() + 1));

        node.set_parameters([("frequency", 220.0), ("detune", 5.0)]);
        assert_eq!(count.get(), 1);

        node.set_parameters([("frequency", 220.0)]);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn reset_parameter_touches_one_key() {
        let mut node = Node::oscillator();
        node.set_parameters([("frequency", 220.0), ("detune", 7.0)]);

        assert!(node.reset_parameter("frequency"));
        assert_eq!(node.parameters().number("frequency"), Some(440.0));
        assert_eq!(node.parameters().number("detune"), Some(7.0));

        assert!(node.reset_parameters());
        assert_eq!(node.parameters().number("detune"), Some(0.0));
        assert!(!node.reset_parameter("nope"));
    }

    #[test]
    fn build_replaces_the_object() {
        let mut backend = RecordingBackend::new();
        let mut node = Node::gain();
        assert!(node.needs_build());

        node.build(&mut backend);
        let first = node.object();
        node.build(&mut backend);

        assert!(first.is_some());
        assert_ne!(node.object(), first);
        assert_eq!(backend.live_objects(), 1);
        assert!(!node.needs_build());
    }

    #[test]
    fn idle_changes_mark_the_object_stale() {
        let mut backend = RecordingBackend::new();
        let mut node = Node::gain();
        node.build(&mut backend);

        let updates = collect_updates([("gain", 0.9)]);
        let applied = node.apply_parameters(Some(&mut backend), &updates);

        assert_eq!(applied, Applied { changed: true, rebuild: true });
        assert!(node.needs_build());
        assert!(backend.schedules().is_empty());
    }

    #[test]
    fn playing_numeric_changes_are_streamed() {
        let mut backend = RecordingBackend::new();
        backend.set_time(1.5);
        let mut node = Node::gain();
        node.build(&mut backend);
        node.set_playing(true);

        let updates = collect_updates([("gain", 0.9)]);
        let applied = node.apply_parameters(Some(&mut backend), &updates);

        assert_eq!(applied, Applied { changed: true, rebuild: false });
        assert_eq!(
            backend.schedules(),
            vec![(node.object().unwrap(), "gain".to_string(), 0.9, 1.5)]
        );
    }
}

//! Audio graph - owns nodes and links, drives playback
//!
//! A graph keeps its nodes in insertion order, which is also the order they
//! are started in. Links live next to the nodes and are only turned into
//! backend connections while the graph plays.
//!
//! Most edits to a playing graph cannot be applied to the running objects
//! (the backend has no disconnect), so they fall back to a full stop and
//! start of the graph. Numeric parameter changes the backend has a control
//! for are the exception and are streamed in place.

use itertools::Itertools;
use tracing::{debug, error, instrument, warn};

use crate::backend::ConnectTarget;
use crate::channel::Channel;
use crate::context::ProcessingContext;
use crate::error::{BackendError, GraphError, Result};
use crate::id::{GraphId, LinkId, NodeId, ObjectId};
use crate::link::{Link, LinkOptions};
use crate::node::{collect_updates, Node, NodeType, Phase};
use crate::param::ParamValue;

/// A set of nodes and the links between them, bound to one
/// [`ProcessingContext`].
#[derive(Debug)]
pub struct AudioGraph {
    id: GraphId,
    name: String,
    context: ProcessingContext,
    nodes: Vec<Node>,
    links: Vec<Link>,
    playing: bool,
    /// Bumped every time the graph stops and its objects are rebuilt.
    epoch: u64,
    nodes_changed: Channel<[Node]>,
    links_changed: Channel<[Link]>,
    playback_changed: Channel<bool>,
}

impl AudioGraph {
    pub fn new(context: ProcessingContext) -> Self {
        Self {
            id: GraphId::new(),
            name: "Graph".to_string(),
            context,
            nodes: Vec::new(),
            links: Vec::new(),
            playing: false,
            epoch: 0,
            nodes_changed: Channel::new(),
            links_changed: Channel::new(),
            playback_changed: Channel::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reuse a known id, e.g. when restoring a saved patch.
    pub fn with_id(mut self, id: GraphId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn context(&self) -> &ProcessingContext {
        &self.context
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Fires with the full node list after every structural change.
    pub fn nodes_changed(&self) -> &Channel<[Node]> {
        &self.nodes_changed
    }

    /// Fires with the full link list after every link change.
    pub fn links_changed(&self) -> &Channel<[Link]> {
        &self.links_changed
    }

    /// Fires `true` after the graph started and `false` after it stopped.
    pub fn playback_changed(&self) -> &Channel<bool> {
        &self.playback_changed
    }

    pub fn find_audio_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id() == id)
    }

    /// Links arriving at `id`.
    pub fn links_from(&self, id: NodeId) -> impl Iterator<Item = &Link> + '_ {
        self.links.iter().filter(move |link| link.to == id)
    }

    /// Links leaving `id`.
    pub fn links_to(&self, id: NodeId) -> impl Iterator<Item = &Link> + '_ {
        self.links.iter().filter(move |link| link.from == id)
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &Node> + '_ {
        self.nodes
            .iter()
            .filter(move |node| node.node_type() == node_type)
    }

    /// The Input node named `name`, which links into this graph land on when
    /// it is nested.
    pub fn input_port(&self, name: &str) -> Option<&Node> {
        self.nodes_of_type(NodeType::Input)
            .find(|node| node.port_name() == Some(name))
    }

    pub fn output_port(&self, name: &str) -> Option<&Node> {
        self.nodes_of_type(NodeType::Output)
            .find(|node| node.port_name() == Some(name))
    }

    pub fn input_ports(&self) -> Vec<&str> {
        self.nodes_of_type(NodeType::Input)
            .filter_map(Node::port_name)
            .collect_vec()
    }

    pub fn output_ports(&self) -> Vec<&str> {
        self.nodes_of_type(NodeType::Output)
            .filter_map(Node::port_name)
            .collect_vec()
    }

    /// Insert a node and build its backend object. A node added to a playing
    /// graph starts right away.
    pub fn add_audio_node(&mut self, mut node: Node) -> Result<NodeId> {
        let id = node.id();
        if self.find_audio_node(id).is_some() {
            return Err(GraphError::DuplicateNode(id));
        }

        attach(&mut node, &self.context);
        self.nodes.push(node);
        if self.playing {
            self.start_at(self.nodes.len() - 1);
        }

        debug!(graph = %self.id, node = %id, "node added");
        self.nodes_changed.notify(&self.nodes);
        Ok(id)
    }

    /// Take a node out of the graph along with every link touching it. The
    /// returned node is detached: no object, not playing.
    pub fn remove_audio_node(&mut self, id: NodeId) -> Result<Node> {
        let index = self.index_of(id)?;
        let mut node = self.nodes.remove(index);
        release(&mut node, &self.context);

        let before = self.links.len();
        self.links.retain(|link| !link.touches(id));
        let dropped_links = before != self.links.len();

        debug!(graph = %self.id, node = %id, "node removed");
        self.nodes_changed.notify(&self.nodes);
        if dropped_links {
            self.links_changed.notify(&self.links);
        }
        Ok(node)
    }

    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) -> Result<()> {
        let index = self.index_of(id)?;
        self.nodes[index].set_label(label);
        self.nodes_changed.notify(&self.nodes);
        Ok(())
    }

    pub fn set_position(&mut self, id: NodeId, x: f32, y: f32) -> Result<()> {
        let index = self.index_of(id)?;
        self.nodes[index].set_position(x, y);
        self.nodes_changed.notify(&self.nodes);
        Ok(())
    }

    /// Link the output of `from` to `to`. If the graph is playing and `to`
    /// is running, the connection is made immediately.
    pub fn link_nodes(&mut self, from: NodeId, to: NodeId, options: LinkOptions) -> Result<LinkId> {
        self.index_of(from)?;
        let to_index = self.index_of(to)?;

        let link = Link::new(from, to, options);
        let id = link.id;
        if self.playing && !link.muted && self.nodes[to_index].is_playing() {
            self.connect_link(&link);
        }

        self.links.push(link);
        self.links_changed.notify(&self.links);
        Ok(id)
    }

    /// Remove the most recently added link from `from` to `to`.
    pub fn unlink_nodes(&mut self, from: NodeId, to: NodeId) -> Result<Link> {
        self.index_of(from)?;
        self.index_of(to)?;
        let position = self
            .links
            .iter()
            .rposition(|link| link.from == from && link.to == to)
            .ok_or(GraphError::LinkNotFound { from, to })?;
        Ok(self.remove_link_at(position))
    }

    pub fn remove_link(&mut self, id: LinkId) -> Result<Link> {
        let position = self.link_index_of(id)?;
        Ok(self.remove_link_at(position))
    }

    /// Mute or unmute a link. A playing graph is restarted to apply it.
    pub fn set_link_muted(&mut self, id: LinkId, muted: bool) -> Result<()> {
        let position = self.link_index_of(id)?;
        if self.links[position].muted == muted {
            return Ok(());
        }

        self.links[position].muted = muted;
        self.links_changed.notify(&self.links);
        if self.playing {
            self.restart();
        }
        Ok(())
    }

    /// Change parameters of a node in this graph.
    ///
    /// Numeric changes on a playing node are scheduled on the running object
    /// when the backend has a control for them. Anything else marks the node
    /// for rebuilding, and a playing graph is restarted once for the whole
    /// batch. Observers of the node hear about it once.
    pub fn set_parameters<I, K, V>(&mut self, id: NodeId, updates: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ParamValue>,
    {
        let index = self.index_of(id)?;
        let updates = collect_updates(updates);

        let node = &mut self.nodes[index];
        let applied = self
            .context
            .with(|backend| node.apply_parameters(Some(backend), &updates));

        if applied.rebuild && self.playing {
            debug!(graph = %self.id, node = %id, "parameter change needs a rebuild");
            self.restart();
        }
        if applied.changed {
            self.nodes[index].notify_parameters();
        }
        Ok(())
    }

    pub fn reset_parameters(&mut self, id: NodeId) -> Result<()> {
        let index = self.index_of(id)?;
        let defaults = self.nodes[index].parameters().defaults();
        self.set_parameters(id, defaults)
    }

    pub fn reset_parameter(&mut self, id: NodeId, name: &str) -> Result<()> {
        let index = self.index_of(id)?;
        match self.nodes[index].parameters().default_of(name).cloned() {
            Some(default) => self.set_parameters(id, [(name, default)]),
            None => {
                warn!(graph = %self.id, node = %id, param = name, "no such parameter to reset");
                Ok(())
            }
        }
    }

    /// Start every node in insertion order. A playing graph is stopped first.
    #[instrument(skip_all, fields(graph = %self.id))]
    pub fn start(&mut self) {
        if self.playing {
            self.stop();
        }

        self.playing = true;
        self.prepare_nodes();
        for index in 0..self.nodes.len() {
            self.start_at(index);
        }

        debug!(nodes = self.nodes.len(), links = self.links.len(), "graph started");
        self.playback_changed.notify(&true);
    }

    /// Stop every node. Does nothing if the graph isn't playing.
    #[instrument(skip_all, fields(graph = %self.id))]
    pub fn stop(&mut self) {
        if !self.playing {
            return;
        }

        for index in 0..self.nodes.len() {
            self.stop_at(index);
        }
        self.playing = false;
        self.epoch += 1;

        debug!("graph stopped");
        self.playback_changed.notify(&false);
    }

    /// (Re)start a single node of a playing graph: rebuild it if needed and
    /// connect its incoming links.
    pub fn start_node(&mut self, id: NodeId) -> Result<()> {
        let index = self.index_of(id)?;
        if !self.playing {
            return Err(GraphError::GraphStopped);
        }
        self.start_at(index);
        Ok(())
    }

    /// Stop a single node. Stopping an idle node does nothing.
    pub fn stop_node(&mut self, id: NodeId) -> Result<()> {
        let index = self.index_of(id)?;
        self.stop_at(index);
        Ok(())
    }

    /// Edit the graph nested in node `id`.
    ///
    /// If the edit restarted the inner graph, connections from this graph
    /// into its ports are gone, so a playing outer graph is restarted too.
    /// An inner graph started while its node is idle is stopped again.
    pub fn edit_subgraph<R>(&mut self, id: NodeId, edit: impl FnOnce(&mut AudioGraph) -> R) -> Result<R> {
        let index = self.index_of(id)?;
        let node_playing = self.nodes[index].is_playing();
        let inner = self.nodes[index]
            .subgraph_mut()
            .ok_or(GraphError::NotAGraph(id))?;

        let epoch = inner.epoch;
        let result = edit(inner);
        if !node_playing && inner.is_playing() {
            inner.stop();
        }
        let restarted = inner.epoch != epoch;

        if restarted && self.playing {
            debug!(graph = %self.id, node = %id, "nested graph restarted");
            self.restart();
        }
        Ok(result)
    }

    /// Rebind the graph to `context`. Objects built on another backend are
    /// dropped and rebuilt on the new one.
    pub(crate) fn adopt_context(&mut self, context: ProcessingContext) {
        if !self.context.same_as(&context) {
            self.release_all();
            self.context = context;
        }
        self.prepare_nodes();
    }

    /// Build every missing or stale object, nested graphs included.
    pub(crate) fn prepare_nodes(&mut self) {
        for node in self.nodes.iter_mut() {
            attach(node, &self.context);
        }
    }

    /// Drop every object of this graph and nested graphs.
    pub(crate) fn release_all(&mut self) {
        let was_playing = self.playing;
        self.playing = false;
        for node in self.nodes.iter_mut() {
            release(node, &self.context);
        }
        if was_playing {
            self.epoch += 1;
            self.playback_changed.notify(&false);
        }
    }

    fn restart(&mut self) {
        self.stop();
        self.start();
    }

    fn index_of(&self, id: NodeId) -> Result<usize> {
        self.nodes
            .iter()
            .position(|node| node.id() == id)
            .ok_or(GraphError::NodeNotFound(id))
    }

    fn link_index_of(&self, id: LinkId) -> Result<usize> {
        self.links
            .iter()
            .position(|link| link.id == id)
            .ok_or(GraphError::LinkIdNotFound(id))
    }

    fn remove_link_at(&mut self, position: usize) -> Link {
        let link = self.links.remove(position);
        self.links_changed.notify(&self.links);
        if self.playing && !link.muted {
            debug!(graph = %self.id, link = %link.id, "link removed from playing graph");
            self.restart();
        }
        link
    }

    fn start_at(&mut self, index: usize) {
        if self.nodes[index].is_playing() {
            self.stop_at(index);
        }
        attach(&mut self.nodes[index], &self.context);
        self.nodes[index].hook(Phase::BeforeStart);

        let id = self.nodes[index].id();
        for link in self.links.iter().filter(|link| link.to == id && !link.muted) {
            self.connect_link(link);
        }

        let node = &mut self.nodes[index];
        node.set_playing(true);
        node.hook(Phase::Started);
    }

    fn stop_at(&mut self, index: usize) {
        let node = &mut self.nodes[index];
        if !node.is_playing() {
            return;
        }

        node.hook(Phase::BeforeStop);
        node.set_playing(false);
        node.hook(Phase::Stopped);
        // no disconnect: a fresh object drops every connection
        self.context.with(|backend| node.build(backend));
    }

    fn connect_link(&self, link: &Link) {
        let result = self
            .resolve(link)
            .and_then(|(source, target)| self.context.with(|backend| backend.connect(source, target)));

        if let Err(err) = result {
            error!(
                graph = %self.id,
                from = %link.from,
                from_port = ?link.from_parameter,
                to = %link.to,
                to_port = ?link.to_parameter,
                %err,
                "failed to connect nodes"
            );
        }
    }

    /// Turn a link into the backend objects it connects, reaching into
    /// nested graphs through their named ports.
    fn resolve<'a>(&'a self, link: &'a Link) -> Result<(ObjectId, ConnectTarget<'a>), BackendError> {
        let source = self
            .find_audio_node(link.from)
            .ok_or(BackendError::Detached { node: link.from })?;
        let dest = self
            .find_audio_node(link.to)
            .ok_or(BackendError::Detached { node: link.to })?;

        let from = match source.subgraph() {
            Some(inner) => {
                let port = port_of(source, link.from_parameter.as_deref(), |name| inner.output_port(name))?;
                object_of(port)?
            }
            None => object_of(source)?,
        };

        let to = match dest.subgraph() {
            Some(inner) => {
                let port = port_of(dest, link.to_parameter.as_deref(), |name| inner.input_port(name))?;
                ConnectTarget::Input(object_of(port)?)
            }
            None => match link.to_parameter.as_deref() {
                Some(param) => ConnectTarget::Param(object_of(dest)?, param),
                None => ConnectTarget::Input(object_of(dest)?),
            },
        };

        Ok((from, to))
    }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        // nested graphs release their own objects when their node drops
        let objects = self.nodes.iter().filter_map(Node::object).collect_vec();
        if objects.is_empty() {
            return;
        }

        let released = self.context.try_with(|backend| {
            for object in &objects {
                backend.discard(*object);
            }
        });
        if released.is_none() {
            warn!(graph = %self.id, objects = objects.len(), "backend busy, objects not released");
        }
    }
}

fn attach(node: &mut Node, context: &ProcessingContext) {
    let playing = node.is_playing();
    if let Some(inner) = node.subgraph_mut() {
        // an inner graph only plays while its graph node does
        if !playing && inner.is_playing() {
            inner.stop();
        }
        inner.adopt_context(context.clone());
    } else if node.needs_build() && !node.is_playing() {
        context.with(|backend| node.build(backend));
    }
}

fn release(node: &mut Node, context: &ProcessingContext) {
    node.set_playing(false);
    if let Some(inner) = node.subgraph_mut() {
        inner.release_all();
    } else {
        context.with(|backend| node.discard(backend));
    }
}

fn object_of(node: &Node) -> Result<ObjectId, BackendError> {
    node.object().ok_or(BackendError::Detached { node: node.id() })
}

fn port_of<'a>(
    graph_node: &Node,
    name: Option<&str>,
    lookup: impl FnOnce(&str) -> Option<&'a Node>,
) -> Result<&'a Node, BackendError> {
    let name = name.ok_or(BackendError::MissingPort { graph: graph_node.id() })?;
    lookup(name).ok_or_else(|| BackendError::PortNotFound {
        graph: graph_node.id(),
        port: name.to_string(),
    })
}

//! The collection of graphs an editing session works with.

use tracing::{debug, warn};

use crate::channel::Channel;
use crate::context::ProcessingContext;
use crate::error::{GraphError, Result};
use crate::graph::AudioGraph;
use crate::id::GraphId;

/// Owns every graph of a session, all built on one [`ProcessingContext`].
///
/// ```
/// use patchbay::{Composer, ProcessingContext};
/// use patchbay::backend::recording::RecordingBackend;
///
/// let mut composer = Composer::new(ProcessingContext::new(RecordingBackend::new()));
/// let id = composer.create_new_graph().id();
/// assert!(composer.find_graph(id).is_some());
/// assert!(composer.remove_graph(id));
/// assert!(composer.is_empty());
/// ```
#[derive(Debug)]
pub struct Composer {
    context: ProcessingContext,
    graphs: Vec<AudioGraph>,
    graphs_changed: Channel<[AudioGraph]>,
}

impl Composer {
    pub fn new(context: ProcessingContext) -> Self {
        Self {
            context,
            graphs: Vec::new(),
            graphs_changed: Channel::new(),
        }
    }

    pub fn context(&self) -> &ProcessingContext {
        &self.context
    }

    pub fn graphs(&self) -> &[AudioGraph] {
        &self.graphs
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// Fires with the full graph list after a graph is added or removed.
    pub fn graphs_changed(&self) -> &Channel<[AudioGraph]> {
        &self.graphs_changed
    }

    /// Create an empty graph on the composer's context and return it.
    pub fn create_new_graph(&mut self) -> &mut AudioGraph {
        let graph = AudioGraph::new(self.context.clone());
        debug!(graph = %graph.id(), "graph created");
        self.push(graph)
    }

    /// Take ownership of `graph`. A graph whose id is already present is
    /// handed back untouched.
    pub fn add_graph(&mut self, mut graph: AudioGraph) -> core::result::Result<GraphId, AudioGraph> {
        let id = graph.id();
        if self.find_graph(id).is_some() {
            warn!(graph = %id, "graph already added");
            return Err(graph);
        }

        graph.adopt_context(self.context.clone());
        self.push(graph);
        Ok(id)
    }

    /// Remove a graph, stopping it first if it plays. Returns whether a graph
    /// was removed.
    pub fn remove_graph(&mut self, id: GraphId) -> bool {
        let Some(index) = self.graphs.iter().position(|graph| graph.id() == id) else {
            return false;
        };

        let mut graph = self.graphs.remove(index);
        graph.stop();
        drop(graph);

        debug!(graph = %id, "graph removed");
        self.graphs_changed.notify(&self.graphs);
        true
    }

    pub fn find_graph(&self, id: GraphId) -> Option<&AudioGraph> {
        self.graphs.iter().find(|graph| graph.id() == id)
    }

    pub fn find_graph_mut(&mut self, id: GraphId) -> Option<&mut AudioGraph> {
        self.graphs.iter_mut().find(|graph| graph.id() == id)
    }

    pub fn graph(&self, id: GraphId) -> Result<&AudioGraph> {
        self.find_graph(id).ok_or(GraphError::GraphNotFound(id))
    }

    pub fn graph_mut(&mut self, id: GraphId) -> Result<&mut AudioGraph> {
        self.find_graph_mut(id).ok_or(GraphError::GraphNotFound(id))
    }

    fn push(&mut self, graph: AudioGraph) -> &mut AudioGraph {
        self.graphs.push(graph);
        self.graphs_changed.notify(&self.graphs);
        let last = self.graphs.len() - 1;
        &mut self.graphs[last]
    }
}

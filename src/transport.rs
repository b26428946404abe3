//! Playback of the active graph through a Destination node.
//!
//! Graphs don't know about the speakers. Starting the transport attaches a
//! [`Destination`](crate::NodeType::Destination) node to the active graph
//! and links every Output node to it; stopping detaches it again, so the
//! saved graph never carries it.

use itertools::Itertools;
use tracing::debug;

use crate::composer::Composer;
use crate::error::{GraphError, Result};
use crate::id::{GraphId, NodeId};
use crate::link::LinkOptions;
use crate::node::{Node, NodeType};

/// Which graph is active, and the Destination node attached to it while it
/// plays.
#[derive(Debug, Default)]
pub struct Transport {
    active: Option<GraphId>,
    destination: Option<NodeId>,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_graph(&self) -> Option<GraphId> {
        self.active
    }

    /// Make `id` the active graph. A previously active graph that is playing
    /// is stopped.
    pub fn set_active_graph(&mut self, composer: &mut Composer, id: GraphId) -> Result<()> {
        composer.graph(id)?;
        if self.active != Some(id) {
            self.stop(composer);
            self.active = Some(id);
            debug!(graph = %id, "active graph changed");
        }
        Ok(())
    }

    pub fn is_playing(&self, composer: &Composer) -> bool {
        self.active
            .and_then(|id| composer.find_graph(id))
            .map_or(false, |graph| graph.is_playing())
    }

    /// Route every Output node of the active graph to a fresh Destination
    /// and start the graph.
    pub fn start(&mut self, composer: &mut Composer) -> Result<()> {
        let id = self.active.ok_or(GraphError::NoActiveGraph)?;
        self.stop(composer);

        let graph = composer.graph_mut(id)?;
        let outputs = graph
            .nodes_of_type(NodeType::Output)
            .map(Node::id)
            .collect_vec();

        let destination = graph.add_audio_node(Node::destination())?;
        self.destination = Some(destination);
        for output in outputs {
            graph.link_nodes(output, destination, LinkOptions::new())?;
        }

        graph.start();
        Ok(())
    }

    /// Stop the active graph and take the Destination out again.
    pub fn stop(&mut self, composer: &mut Composer) {
        let graph = match self.active {
            Some(id) => composer.find_graph_mut(id),
            None => None,
        };
        let Some(graph) = graph else {
            self.destination = None;
            return;
        };

        graph.stop();
        if let Some(destination) = self.destination.take() {
            // removing the node drops its links as well
            if graph.remove_audio_node(destination).is_err() {
                debug!(node = %destination, "destination already gone");
            }
        }
    }
}

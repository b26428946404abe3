//! Directed connections between nodes.

use crate::id::{LinkId, NodeId};

/// A directed connection from one node's output to another node's input.
///
/// Links refer to their endpoints by id; the graph owns the nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub id: LinkId,
    pub from: NodeId,
    pub to: NodeId,
    /// Output port to read from when `from` is a nested graph.
    pub from_parameter: Option<String>,
    /// Input port (nested graph) or parameter input to write to.
    pub to_parameter: Option<String>,
    /// Muted links are kept but not connected when the graph starts.
    pub muted: bool,
}

/// Optional settings for [`AudioGraph::link_nodes`](crate::AudioGraph::link_nodes).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkOptions {
    pub from_parameter: Option<String>,
    pub to_parameter: Option<String>,
    pub muted: bool,
}

impl LinkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_port(mut self, name: impl Into<String>) -> Self {
        self.from_parameter = Some(name.into());
        self
    }

    pub fn to_port(mut self, name: impl Into<String>) -> Self {
        self.to_parameter = Some(name.into());
        self
    }

    pub fn muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }
}

impl Link {
    pub(crate) fn new(from: NodeId, to: NodeId, options: LinkOptions) -> Self {
        Self {
            id: LinkId::new(),
            from,
            to,
            from_parameter: options.from_parameter,
            to_parameter: options.to_parameter,
            muted: options.muted,
        }
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.from == node || self.to == node
    }
}

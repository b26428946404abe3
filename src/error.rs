//! Error types.
//!
//! Two families: [`GraphError`] for structural mistakes made by the caller
//! (these abort the call), and [`BackendError`] for requests the signal
//! processing backend refuses. Backend errors raised while a node is being
//! started are logged and skipped instead of being returned.

use thiserror::Error;

use crate::id::{GraphId, LinkId, NodeId, ObjectId};

/// Errors reported by a [`Backend`](crate::Backend).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("unknown backend object {0}")]
    UnknownObject(ObjectId),

    #[error("connection rejected: {reason}")]
    Rejected { reason: String },

    #[error("graph {graph} has no port named '{port}'")]
    PortNotFound { graph: NodeId, port: String },

    #[error("links to or from graph {graph} must name a port")]
    MissingPort { graph: NodeId },

    #[error("node {node} has no processing object")]
    Detached { node: NodeId },

    #[error("no live control named '{param}'")]
    NoControl { param: String },

    #[error("automation queue is full")]
    QueueFull,
}

impl BackendError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        BackendError::Rejected {
            reason: reason.into(),
        }
    }
}

/// Errors returned by graph and composer operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("no link from {from} to {to}")]
    LinkNotFound { from: NodeId, to: NodeId },

    #[error("link not found: {0}")]
    LinkIdNotFound(LinkId),

    #[error("graph not found: {0}")]
    GraphNotFound(GraphId),

    #[error("no graph is active")]
    NoActiveGraph,

    #[error("graph already contains a node with id {0}")]
    DuplicateNode(NodeId),

    #[error("node {0} is not a graph")]
    NotAGraph(NodeId),

    #[error("graph is not playing")]
    GraphStopped,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type Result<T, E = GraphError> = core::result::Result<T, E>;

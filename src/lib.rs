//! Patchbay - an editable audio graph engine
//!
//! Design principles:
//! - A graph owns its nodes and links; links refer to nodes by id
//! - Every node is backed by one object built by a pluggable [`Backend`]
//! - Numeric parameter changes are streamed into running objects, anything
//!   else rebuilds the object and restarts the graph
//! - Graphs nest: a graph can be a node, reached through named Input and
//!   Output ports
//! - Observers subscribe to [`Channel`]s; nothing is polled
//!
//! ```
//! use patchbay::{Composer, LinkOptions, Node, ProcessingContext, Transport};
//! use patchbay::backend::recording::RecordingBackend;
//!
//! let mut composer = Composer::new(ProcessingContext::new(RecordingBackend::new()));
//! let graph = composer.create_new_graph();
//! let id = graph.id();
//!
//! let osc = graph.add_audio_node(Node::oscillator()).unwrap();
//! let gain = graph.add_audio_node(Node::gain()).unwrap();
//! let out = graph.add_audio_node(Node::output("main")).unwrap();
//! graph.link_nodes(osc, gain, LinkOptions::new()).unwrap();
//! graph.link_nodes(gain, out, LinkOptions::new()).unwrap();
//!
//! let mut transport = Transport::new();
//! transport.set_active_graph(&mut composer, id).unwrap();
//! transport.start(&mut composer).unwrap();
//!
//! let graph = composer.graph_mut(id).unwrap();
//! graph.set_parameters(osc, [("frequency", 220.0)]).unwrap();
//! assert!(graph.is_playing());
//! ```

pub mod backend;
mod channel;
mod composer;
mod context;
mod device;
mod error;
mod graph;
mod id;
mod link;
mod node;
mod param;
mod transport;
pub mod units;

pub use backend::{Backend, ConnectTarget};
pub use channel::{Channel, SubscriptionId};
pub use composer::Composer;
pub use context::ProcessingContext;
pub use device::CpalDevice;
#[cfg(feature = "cpal_sink")]
pub use device::Playback;
pub use error::{BackendError, GraphError, Result};
pub use graph::AudioGraph;
pub use id::{GraphId, LinkId, NodeId, ObjectId};
pub use link::{Link, LinkOptions};
pub use node::{Node, NodeType, Position};
pub use param::{ParamValue, Parameters, Waveform};
pub use transport::Transport;

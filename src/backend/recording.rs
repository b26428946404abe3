//! A backend that records requests instead of rendering audio.

use hashbrown::{HashMap, HashSet};
use tracing::trace;

use crate::backend::{live_controls, Backend, ConnectTarget};
use crate::error::BackendError;
use crate::id::ObjectId;
use crate::node::NodeType;
use crate::param::Parameters;

/// One request received by a [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    Create {
        object: ObjectId,
        kind: NodeType,
        params: Parameters,
    },
    Discard(ObjectId),
    Connect {
        source: ObjectId,
        target: ObjectId,
        param: Option<String>,
    },
    Schedule {
        object: ObjectId,
        param: String,
        value: f32,
        at: f64,
    },
}

/// In-memory backend keeping a log of every call made to it.
///
/// Objects are plain counters; connections are accepted unless the target
/// was marked with [`reject_connections_into`](Self::reject_connections_into).
/// Controls are the ones listed by [`live_controls`].
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    live: HashMap<ObjectId, NodeType>,
    rejecting: HashSet<ObjectId>,
    next_object: u64,
    time: f64,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Every accepted or rejected connect request as `(source, target)`.
    pub fn connects(&self) -> Vec<(ObjectId, ObjectId)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Connect { source, target, .. } => Some((*source, *target)),
                _ => None,
            })
            .collect()
    }

    pub fn schedules(&self) -> Vec<(ObjectId, String, f32, f64)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Schedule {
                    object,
                    param,
                    value,
                    at,
                } => Some((*object, param.clone(), *value, *at)),
                _ => None,
            })
            .collect()
    }

    pub fn creates(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Create { .. }))
            .count()
    }

    pub fn discards(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Discard(_)))
            .count()
    }

    /// Objects created and not yet discarded.
    pub fn live_objects(&self) -> usize {
        self.live.len()
    }

    pub fn kind_of(&self, object: ObjectId) -> Option<NodeType> {
        self.live.get(&object).copied()
    }

    /// Refuse every later connection whose target is `object`.
    pub fn reject_connections_into(&mut self, object: ObjectId) {
        self.rejecting.insert(object);
    }

    pub fn set_time(&mut self, seconds: f64) {
        self.time = seconds;
    }
}

impl Backend for RecordingBackend {
    fn create(&mut self, kind: NodeType, params: &Parameters) -> Result<ObjectId, BackendError> {
        if kind == NodeType::Graph {
            return Err(BackendError::rejected("graphs are not processing objects"));
        }

        let object = ObjectId::new(self.next_object);
        self.next_object += 1;
        self.live.insert(object, kind);
        self.calls.push(BackendCall::Create {
            object,
            kind,
            params: params.clone(),
        });
        trace!(%object, ?kind, "create");
        Ok(object)
    }

    fn discard(&mut self, object: ObjectId) {
        if self.live.remove(&object).is_some() {
            self.calls.push(BackendCall::Discard(object));
            trace!(%object, "discard");
        }
    }

    fn connect(&mut self, source: ObjectId, target: ConnectTarget<'_>) -> Result<(), BackendError> {
        let (to, param) = match target {
            ConnectTarget::Input(to) => (to, None),
            ConnectTarget::Param(to, name) => (to, Some(name.to_string())),
        };
        self.calls.push(BackendCall::Connect {
            source,
            target: to,
            param,
        });
        trace!(%source, target = %to, "connect");

        for object in [source, to] {
            if !self.live.contains_key(&object) {
                return Err(BackendError::UnknownObject(object));
            }
        }
        if self.rejecting.contains(&to) {
            return Err(BackendError::rejected(format!("{} refuses inputs", to)));
        }
        Ok(())
    }

    fn has_control(&self, object: ObjectId, param: &str) -> bool {
        self.live
            .get(&object)
            .map_or(false, |kind| live_controls(*kind).contains(&param))
    }

    fn schedule(&mut self, object: ObjectId, param: &str, value: f32, at: f64) -> Result<(), BackendError> {
        if !self.has_control(object, param) {
            return Err(BackendError::NoControl {
                param: param.to_string(),
            });
        }
        self.calls.push(BackendCall::Schedule {
            object,
            param: param.to_string(),
            value,
            at,
        });
        trace!(%object, param, value, at, "schedule");
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.time
    }
}

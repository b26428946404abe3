//! Shared handle to the backend every node of a graph is built on.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use crate::backend::Backend;

/// The processing context a graph constructs its nodes' objects with.
///
/// Cloning is cheap and yields a handle to the same backend. Graphs are
/// driven from a single thread, so the backend sits behind a `RefCell`
/// rather than a lock.
#[derive(Clone)]
pub struct ProcessingContext {
    backend: Rc<RefCell<dyn Backend>>,
}

impl ProcessingContext {
    /// Take ownership of a backend.
    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        Self {
            backend: Rc::new(RefCell::new(backend)),
        }
    }

    /// Share a backend the caller keeps a typed handle to, e.g. to pull
    /// rendered audio out of it.
    pub fn from_shared<B: Backend + 'static>(backend: Rc<RefCell<B>>) -> Self {
        Self { backend }
    }

    /// Current processing time of the backend, in seconds.
    pub fn current_time(&self) -> f64 {
        self.backend.borrow().current_time()
    }

    /// Whether both handles point at the same backend.
    pub fn same_as(&self, other: &ProcessingContext) -> bool {
        Rc::ptr_eq(&self.backend, &other.backend)
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut dyn Backend) -> R) -> R {
        let mut backend = self.backend.borrow_mut();
        f(&mut *backend)
    }

    /// Like [`with`](Self::with), but gives up instead of panicking when the
    /// backend is already borrowed. Used on teardown paths.
    pub(crate) fn try_with<R>(&self, f: impl FnOnce(&mut dyn Backend) -> R) -> Option<R> {
        let mut backend = self.backend.try_borrow_mut().ok()?;
        Some(f(&mut *backend))
    }
}

impl fmt::Debug for ProcessingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingContext")
            .field("backend", &Rc::as_ptr(&self.backend))
            .finish()
    }
}

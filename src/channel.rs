//! Synchronous change notification.
//!
//! A [`Channel`] is a list of callbacks. The owner of some state calls
//! [`Channel::notify`] with the current value after mutating it, and every
//! subscriber sees that value before `notify` returns. There is no
//! buffering and no global registry; each graph and node owns its own
//! channels.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use patchbay::Channel;
//!
//! let seen = Rc::new(Cell::new(0));
//! let channel = Channel::<u32>::new();
//!
//! let sink = seen.clone();
//! let id = channel.subscribe(move |v| sink.set(*v));
//! channel.notify(&7);
//! assert_eq!(seen.get(), 7);
//!
//! channel.unsubscribe(id);
//! channel.notify(&9);
//! assert_eq!(seen.get(), 7);
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;

/// Token returned by [`Channel::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SubscriptionId(u64);

struct Subscriber<T: ?Sized> {
    id: SubscriptionId,
    callback: Box<dyn FnMut(&T)>,
}

/// An ordered list of callbacks receiving snapshots of type `T`.
///
/// Callbacks may subscribe or unsubscribe while a notification is being
/// delivered. Subscribers added during delivery are first called on the
/// next `notify`; subscribers removed during delivery are not called for
/// the rest of it.
pub struct Channel<T: ?Sized> {
    subscribers: RefCell<Vec<Subscriber<T>>>,
    /// Unsubscribed while a delivery was in flight
    removed: RefCell<Vec<SubscriptionId>>,
    next_id: Cell<u64>,
    /// Nesting depth of `notify`
    depth: Cell<usize>,
}

impl<T: ?Sized> Channel<T> {
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
            removed: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            depth: Cell::new(0),
        }
    }

    /// Register a callback. It receives the value passed to every later
    /// [`notify`](Self::notify).
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&T) + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        self.subscribers.borrow_mut().push(Subscriber {
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Remove a callback. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.borrow_mut().retain(|s| s.id != id);
        if self.depth.get() > 0 {
            self.removed.borrow_mut().push(id);
        }
    }

    /// Call every subscriber with `value`, in subscription order.
    ///
    /// Subscribers added during delivery first hear the next call. A
    /// `notify` issued from inside a callback on the same channel reaches
    /// nobody: the subscriber list is held by the outer call until it
    /// returns.
    pub fn notify(&self, value: &T) {
        // Deliver from a snapshot so callbacks are free to touch the list.
        let mut active = self.subscribers.take();
        self.depth.set(self.depth.get() + 1);

        for subscriber in active.iter_mut() {
            if self.removed.borrow().contains(&subscriber.id) {
                continue;
            }
            (subscriber.callback)(value);
        }

        self.depth.set(self.depth.get() - 1);

        let added = self.subscribers.take();
        active.extend(added);
        if self.depth.get() == 0 {
            let removed = self.removed.take();
            active.retain(|s| !removed.contains(&s.id));
        }
        *self.subscribers.borrow_mut() = active;
    }

    /// Number of registered callbacks. Only meaningful outside of `notify`.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl<T: ?Sized> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

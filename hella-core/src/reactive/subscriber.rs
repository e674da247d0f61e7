//! Identities and subscriber callbacks.
//!
//! Every signal gets a [`SignalId`] and every notification target (an effect
//! runner or a callback passed to `subscribe`) gets a [`SubscriberId`]. The ids
//! are the stable keys used by subscriber sets, the pending batch set and the
//! limits guard.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;

/// Unique identifier for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl SignalId {
    /// Generate a new unique signal ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SignalId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a subscriber.
///
/// Effects use their subscriber ID as their identity in the limits guard, so
/// the same effect reading a signal twice only subscribes once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A notification target attached to a signal.
///
/// Cloning is cheap; clones share the callback and the ID.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    notify: Rc<dyn Fn() -> Result<()>>,
}

impl Subscriber {
    /// Create a subscriber with a fresh ID.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() -> Result<()> + 'static,
    {
        Self::with_id(SubscriberId::new(), notify)
    }

    /// Create a subscriber for an existing ID.
    pub fn with_id<F>(id: SubscriberId, notify: F) -> Self
    where
        F: Fn() -> Result<()> + 'static,
    {
        Self {
            id,
            notify: Rc::new(notify),
        }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Notify the subscriber that a signal it watches changed.
    pub fn notify(&self) -> Result<()> {
        (self.notify)()
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);

        assert_ne!(SignalId::new(), SignalId::new());
    }

    #[test]
    fn subscriber_notify_calls_callback() {
        let called = Rc::new(Cell::new(0));
        let called_clone = called.clone();

        let subscriber = Subscriber::new(move || {
            called_clone.set(called_clone.get() + 1);
            Ok(())
        });

        assert_eq!(called.get(), 0);
        subscriber.notify().unwrap();
        subscriber.clone().notify().unwrap();
        assert_eq!(called.get(), 2);
    }

    #[test]
    fn with_id_keeps_identity() {
        let id = SubscriberId::new();
        let subscriber = Subscriber::with_id(id, || Ok(()));
        assert_eq!(subscriber.id(), id);
        assert_eq!(subscriber.clone().id(), id);
    }
}

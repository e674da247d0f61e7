//! Reactive Context
//!
//! The context tracks which effect is currently running. This enables
//! automatic dependency tracking: when a signal is read, it subscribes the
//! effect on top of the stack and reports itself as a dependency.
//!
//! # Implementation
//!
//! The stack lives in the runtime, not in each signal. Entering a context
//! pushes the running effect and returns a guard; dropping the guard pops it,
//! so the stack stays balanced even if the effect body returns early or
//! panics.
//!
//! Nested effects (an effect created inside another effect's body) push on
//! top and pop back to the outer effect when they finish.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::subscriber::{SignalId, Subscriber, SubscriberId};

/// Something that can be read as a dependency.
///
/// Signals implement this so effects can drop subscriptions they no longer
/// need without knowing the signal's value type.
pub trait Source {
    /// The identity of this source.
    fn signal_id(&self) -> SignalId;

    /// Remove a subscriber without running the unsubscribe observer.
    ///
    /// Used when an effect stops reading a signal or is disposed.
    fn detach(&self, subscriber: SubscriberId);
}

/// A computation that collects dependencies while it runs.
pub trait Tracker {
    /// The identity used for subscriptions and the limits guard.
    fn subscriber_id(&self) -> SubscriberId;

    /// Build the callback a signal stores to re-run this computation.
    fn subscriber(self: Rc<Self>) -> Subscriber;

    /// Record that `source` was read during the current run.
    fn track(&self, id: SignalId, source: Weak<dyn Source>);
}

/// Stack of running computations.
#[derive(Default)]
pub struct ContextStack {
    stack: RefCell<Vec<Rc<dyn Tracker>>>,
}

impl ContextStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a new reactive context for the given tracker.
    ///
    /// While the returned guard is alive, signal reads subscribe `tracker`.
    pub fn enter(&self, tracker: Rc<dyn Tracker>) -> ContextGuard<'_> {
        let subscriber_id = tracker.subscriber_id();
        self.stack.borrow_mut().push(tracker);
        ContextGuard {
            stack: self,
            subscriber_id,
        }
    }

    /// Check if there is an active reactive context.
    pub fn is_active(&self) -> bool {
        !self.stack.borrow().is_empty()
    }

    /// The computation on top of the stack, if any.
    pub fn current(&self) -> Option<Rc<dyn Tracker>> {
        self.stack.borrow().last().cloned()
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber(&self) -> Option<SubscriberId> {
        self.stack.borrow().last().map(|entry| entry.subscriber_id())
    }

    /// Number of nested running computations.
    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    /// Remove the innermost entry for `subscriber_id`.
    ///
    /// Returns false if the subscriber was not on the stack.
    pub fn remove(&self, subscriber_id: SubscriberId) -> bool {
        let mut stack = self.stack.borrow_mut();
        match stack
            .iter()
            .rposition(|entry| entry.subscriber_id() == subscriber_id)
        {
            Some(position) => {
                stack.remove(position);
                true
            }
            None => false,
        }
    }
}

/// Guard that pops the context when dropped.
pub struct ContextGuard<'a> {
    stack: &'a ContextStack,
    subscriber_id: SubscriberId,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        // Disposal may already have removed the entry mid-run.
        self.stack.remove(self.subscriber_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        id: SubscriberId,
        seen: RefCell<Vec<SignalId>>,
    }

    impl Recorder {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                id: SubscriberId::new(),
                seen: RefCell::new(Vec::new()),
            })
        }
    }

    impl Tracker for Recorder {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn subscriber(self: Rc<Self>) -> Subscriber {
            Subscriber::with_id(self.id, || Ok(()))
        }

        fn track(&self, id: SignalId, _source: Weak<dyn Source>) {
            self.seen.borrow_mut().push(id);
        }
    }

    #[test]
    fn context_tracks_subscriber() {
        let stack = ContextStack::new();
        let recorder = Recorder::new();

        assert!(!stack.is_active());
        assert!(stack.current_subscriber().is_none());

        {
            let _ctx = stack.enter(recorder.clone());
            assert!(stack.is_active());
            assert_eq!(stack.current_subscriber(), Some(recorder.id));
        }

        // Context should be cleaned up after drop
        assert!(!stack.is_active());
        assert!(stack.current().is_none());
    }

    #[test]
    fn nested_contexts() {
        let stack = ContextStack::new();
        let outer = Recorder::new();
        let inner = Recorder::new();

        {
            let _outer = stack.enter(outer.clone());
            {
                let _inner = stack.enter(inner.clone());
                assert_eq!(stack.current_subscriber(), Some(inner.id));
                assert_eq!(stack.depth(), 2);
            }
            // After inner context drops, outer should be current
            assert_eq!(stack.current_subscriber(), Some(outer.id));
        }

        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn removed_entry_is_not_popped_twice() {
        let stack = ContextStack::new();
        let outer = Recorder::new();
        let inner = Recorder::new();

        let _outer = stack.enter(outer.clone());
        {
            let _inner = stack.enter(inner.clone());
            assert!(stack.remove(inner.id));
            assert!(!stack.remove(inner.id));
            assert_eq!(stack.current_subscriber(), Some(outer.id));
        }

        // The inner guard must not have popped the outer entry.
        assert_eq!(stack.current_subscriber(), Some(outer.id));
    }

    #[test]
    fn current_tracker_receives_reads() {
        let stack = ContextStack::new();
        let recorder = Recorder::new();
        let _ctx = stack.enter(recorder.clone());

        let signal = SignalId::new();
        if let Some(tracker) = stack.current() {
            let source: Weak<dyn Source> = Weak::<NoSource>::new();
            tracker.track(signal, source);
        }
        assert_eq!(*recorder.seen.borrow(), vec![signal]);
    }

    struct NoSource;

    impl Source for NoSource {
        fn signal_id(&self) -> SignalId {
            SignalId::new()
        }

        fn detach(&self, _subscriber: SubscriberId) {}
    }
}

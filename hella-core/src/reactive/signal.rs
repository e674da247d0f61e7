//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect is running, the signal subscribes
//!    that effect and reports itself as one of the effect's dependencies.
//!
//! 2. When a signal's value changes, its subscribers are notified: right away
//!    into the pending set if a batch is open, otherwise at the next frame.
//!    Several writes before the frame boundary notify once.
//!
//! 3. Notifications re-run dependent effects, which read the signal again.
//!
//! # Lifecycle
//!
//! A new signal is `Uninitialized`. Writing it in that state only replaces the
//! value that will be used once the signal is first read, subscribed or
//! disposed; no validation or notification happens. Any other operation moves
//! it to `Initialized`, after which writes go through validation, sanitizing
//! and notification.
//!
//! # Configuration
//!
//! [`SignalConfig`] attaches a validator (returning `true` rejects the value),
//! a sanitizer applied before storing, and observers for reads, writes,
//! subscription changes and disposal.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::context::Source;
use super::runtime::ReactiveRuntime;
use super::subscriber::{SignalId, Subscriber, SubscriberId};
use crate::error::{keep_first, ReactiveError, Result};

/// Stack-allocated snapshot of a subscriber set taken before notifying.
type Snapshot = SmallVec<[Subscriber; 8]>;

type Validator<T> = Box<dyn Fn(&T) -> bool>;
type Sanitizer<T> = Box<dyn Fn(T) -> T>;
type ReadObserver<T> = Box<dyn Fn(&T)>;
type WriteObserver<T> = Box<dyn Fn(&T, &T)>;
type CountObserver = Box<dyn Fn(usize)>;

/// Optional hooks for a signal.
pub struct SignalConfig<T> {
    validate: Option<Validator<T>>,
    sanitize: Option<Sanitizer<T>>,
    on_read: Option<ReadObserver<T>>,
    on_write: Option<WriteObserver<T>>,
    on_subscribe: Option<CountObserver>,
    on_unsubscribe: Option<CountObserver>,
    on_dispose: Option<Box<dyn Fn()>>,
}

impl<T> Default for SignalConfig<T> {
    fn default() -> Self {
        Self {
            validate: None,
            sanitize: None,
            on_read: None,
            on_write: None,
            on_subscribe: None,
            on_unsubscribe: None,
            on_dispose: None,
        }
    }
}

impl<T> SignalConfig<T> {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject values for which `f` returns true, on both read and write.
    pub fn validate(mut self, f: impl Fn(&T) -> bool + 'static) -> Self {
        self.validate = Some(Box::new(f));
        self
    }

    /// Transform incoming values before they are stored.
    pub fn sanitize(mut self, f: impl Fn(T) -> T + 'static) -> Self {
        self.sanitize = Some(Box::new(f));
        self
    }

    /// Observe every successful read.
    pub fn on_read(mut self, f: impl Fn(&T) + 'static) -> Self {
        self.on_read = Some(Box::new(f));
        self
    }

    /// Observe every stored write with `(old, new)`.
    pub fn on_write(mut self, f: impl Fn(&T, &T) + 'static) -> Self {
        self.on_write = Some(Box::new(f));
        self
    }

    /// Observe explicit subscriptions with the new subscriber count.
    pub fn on_subscribe(mut self, f: impl Fn(usize) + 'static) -> Self {
        self.on_subscribe = Some(Box::new(f));
        self
    }

    /// Observe explicit unsubscriptions with the remaining subscriber count.
    pub fn on_unsubscribe(mut self, f: impl Fn(usize) + 'static) -> Self {
        self.on_unsubscribe = Some(Box::new(f));
        self
    }

    /// Observe disposal.
    pub fn on_dispose(mut self, f: impl Fn() + 'static) -> Self {
        self.on_dispose = Some(Box::new(f));
        self
    }
}

impl<T> fmt::Debug for SignalConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalConfig")
            .field("validate", &self.validate.is_some())
            .field("sanitize", &self.sanitize.is_some())
            .field("on_read", &self.on_read.is_some())
            .field("on_write", &self.on_write.is_some())
            .field("on_subscribe", &self.on_subscribe.is_some())
            .field("on_unsubscribe", &self.on_unsubscribe.is_some())
            .field("on_dispose", &self.on_dispose.is_some())
            .finish()
    }
}

/// Lifecycle tag of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    /// Not read, subscribed or disposed yet. Writes replace the initial value.
    Uninitialized,
    /// Fully live.
    Initialized,
}

struct SignalInner<T> {
    id: SignalId,
    runtime: ReactiveRuntime,
    state: Cell<SignalState>,
    value: RefCell<T>,
    subscribers: RefCell<IndexMap<SubscriberId, Subscriber>>,
    config: SignalConfig<T>,
}

impl<T: Clone + 'static> SignalInner<T> {
    fn materialize(&self) {
        if self.state.get() == SignalState::Uninitialized {
            self.state.set(SignalState::Initialized);
            tracing::trace!(signal = self.id.raw(), "signal initialized");
        }
    }

    fn check(&self, value: &T) -> Result<()> {
        match &self.config.validate {
            Some(validate) if validate(value) => Err(ReactiveError::Validation { signal: self.id }),
            _ => Ok(()),
        }
    }

    /// Insert an explicit subscriber if it is new, enforcing the ceiling.
    fn attach(&self, subscriber: Subscriber) -> Result<usize> {
        {
            let subscribers = self.subscribers.borrow();
            if subscribers.contains_key(&subscriber.id()) {
                return Ok(subscribers.len());
            }

            let guard = self.runtime.guard();
            if guard.subscriber_limit_exceeded(subscribers.len() + 1) {
                return Err(ReactiveError::SubscriberLimit {
                    limit: guard.subscriber_limit(),
                });
            }
        }
        Ok(self.insert(subscriber))
    }

    /// Insert a subscriber without a ceiling check. Implicit subscriptions
    /// made by reads still count toward later `subscribe` calls.
    fn insert(&self, subscriber: Subscriber) -> usize {
        let count = {
            let mut subscribers = self.subscribers.borrow_mut();
            subscribers.entry(subscriber.id()).or_insert(subscriber);
            subscribers.len()
        };
        self.runtime.guard_mut().record_subscriber_count(self.id, count);
        count
    }

    fn remove(&self, subscriber: SubscriberId) -> Option<usize> {
        let count = {
            let mut subscribers = self.subscribers.borrow_mut();
            subscribers.shift_remove(&subscriber)?;
            subscribers.len()
        };
        self.runtime.guard_mut().record_subscriber_count(self.id, count);
        Some(count)
    }

    fn snapshot(&self) -> Snapshot {
        self.subscribers.borrow().values().cloned().collect()
    }

    /// Deliver a notification to the subscribers present right now.
    fn fire(&self) -> Result<()> {
        let subscribers = self.snapshot();
        tracing::trace!(
            signal = self.id.raw(),
            subscribers = subscribers.len(),
            "notifying subscribers"
        );

        let mut first_error = None;
        for subscriber in subscribers {
            keep_first(&mut first_error, subscriber.notify());
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<T: Clone + 'static> Source for SignalInner<T> {
    fn signal_id(&self) -> SignalId {
        self.id
    }

    fn detach(&self, subscriber: SubscriberId) {
        self.remove(subscriber);
    }
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        if let Some(mut guard) = self.runtime.try_guard_mut() {
            guard.forget_signal(self.id);
        }
    }
}

/// A reactive cell holding a value of type `T`.
///
/// Cloning a `Signal` creates another handle to the same cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = signal(0);
///
/// // Read the value
/// let value = count.get()?;
///
/// // Update the value (notifies subscribers)
/// count.set(5)?;
/// ```
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T: Clone + 'static> Signal<T> {
    /// Create a signal on the calling thread's default runtime.
    pub fn new(initial: T) -> Self {
        Self::with_runtime(ReactiveRuntime::current(), initial, SignalConfig::default())
    }

    /// Create a signal on a specific runtime.
    pub fn with_runtime(runtime: ReactiveRuntime, initial: T, config: SignalConfig<T>) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: SignalId::new(),
                runtime,
                state: Cell::new(SignalState::Uninitialized),
                value: RefCell::new(initial),
                subscribers: RefCell::new(IndexMap::new()),
                config,
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SignalState {
        self.inner.state.get()
    }

    /// Get the current value.
    ///
    /// If an effect is running, it is subscribed to this signal and the signal
    /// joins the effect's dependency set.
    pub fn get(&self) -> Result<T> {
        let value = self.read()?;
        self.track();
        Ok(value)
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> Result<T> {
        self.read()
    }

    /// Run `f` on the current value, with the same validation and tracking as
    /// [`get`](Self::get).
    ///
    /// `f` borrows the stored value without cloning it and must not write
    /// this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let inner = &self.inner;
        inner.materialize();
        {
            let value = inner.value.borrow();
            inner.check(&*value)?;
            if let Some(on_read) = &inner.config.on_read {
                on_read(&*value);
            }
        }
        self.track();

        let value = inner.value.borrow();
        Ok(f(&*value))
    }

    /// Set a new value and notify subscribers.
    pub fn set(&self, value: T) -> Result<()> {
        let inner = &self.inner;

        if inner.state.get() == SignalState::Uninitialized {
            *inner.value.borrow_mut() = value;
            tracing::trace!(signal = inner.id.raw(), "write stored as initial value");
            return Ok(());
        }

        inner.check(&value)?;
        let next = match &inner.config.sanitize {
            Some(sanitize) => sanitize(value),
            None => value,
        };

        let old = std::mem::replace(&mut *inner.value.borrow_mut(), next);
        if let Some(on_write) = &inner.config.on_write {
            let new = inner.value.borrow().clone();
            on_write(&old, &new);
        }

        self.notify();
        Ok(())
    }

    /// Update the value using a function of the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<()> {
        let next = {
            let current = self.read()?;
            f(&current)
        };
        self.set(next)
    }

    /// Register a callback to run whenever the signal notifies.
    ///
    /// Fails without changing anything if the subscriber ceiling is reached.
    pub fn subscribe(&self, f: impl Fn() + 'static) -> Result<Subscription> {
        self.inner.materialize();

        let subscriber = Subscriber::new(move || {
            f();
            Ok(())
        });
        let id = subscriber.id();
        let count = self.inner.attach(subscriber)?;

        if let Some(on_subscribe) = &self.inner.config.on_subscribe {
            on_subscribe(count);
        }

        let source: Weak<SignalInner<T>> = Rc::downgrade(&self.inner);
        Ok(Subscription {
            id,
            signal: source,
        })
    }

    /// Run the dispose observer and drop every subscriber. Irreversible.
    pub fn dispose(&self) {
        let inner = &self.inner;
        inner.materialize();

        if let Some(on_dispose) = &inner.config.on_dispose {
            on_dispose();
        }

        let dropped = {
            let mut subscribers = inner.subscribers.borrow_mut();
            let dropped = subscribers.len();
            subscribers.clear();
            dropped
        };
        inner.runtime.guard_mut().record_subscriber_count(inner.id, 0);
        tracing::debug!(signal = inner.id.raw(), dropped, "signal disposed");
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// The runtime this signal belongs to.
    pub fn runtime(&self) -> &ReactiveRuntime {
        &self.inner.runtime
    }

    fn read(&self) -> Result<T> {
        let inner = &self.inner;
        inner.materialize();

        let value = inner.value.borrow().clone();
        inner.check(&value)?;
        if let Some(on_read) = &inner.config.on_read {
            on_read(&value);
        }
        Ok(value)
    }

    /// Subscribe the running effect, if any. Never fails: the subscriber
    /// ceiling applies to `subscribe` only.
    fn track(&self) {
        let Some(tracker) = self.inner.runtime.context().current() else {
            return;
        };

        self.inner.insert(tracker.clone().subscriber());

        let source: Weak<SignalInner<T>> = Rc::downgrade(&self.inner);
        tracker.track(self.inner.id, source);
    }

    fn notify(&self) {
        let inner = &self.inner;
        let runtime = &inner.runtime;

        if runtime.is_batching() {
            let subscribers = inner.snapshot();
            tracing::trace!(
                signal = inner.id.raw(),
                subscribers = subscribers.len(),
                "write deferred to batch"
            );
            runtime.batch_state().enqueue(subscribers);
            return;
        }

        let weak = Rc::downgrade(inner);
        runtime.scheduler().schedule_frame(
            inner.id,
            Box::new(move || match weak.upgrade() {
                Some(inner) => inner.fire(),
                None => Ok(()),
            }),
        );
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Signal<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for Signal<T> {}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Signal");
        debug.field("id", &self.inner.id);
        debug.field("state", &self.inner.state.get());
        match self.inner.value.try_borrow() {
            Ok(value) => debug.field("value", &*value),
            Err(_) => debug.field("value", &"<borrowed>"),
        };
        debug
            .field("subscriber_count", &self.inner.subscribers.borrow().len())
            .finish()
    }
}

/// Handle returned by [`Signal::subscribe`].
///
/// Dropping it leaves the callback subscribed; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
#[must_use = "dropping a Subscription does not unsubscribe"]
pub struct Subscription {
    id: SubscriberId,
    signal: Weak<dyn UnsubscribeTarget>,
}

impl Subscription {
    /// The subscriber ID of the registered callback.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the callback and run the signal's unsubscribe observer.
    pub fn unsubscribe(self) {
        if let Some(signal) = self.signal.upgrade() {
            signal.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

trait UnsubscribeTarget {
    fn unsubscribe(&self, subscriber: SubscriberId);
}

impl<T: Clone + 'static> UnsubscribeTarget for SignalInner<T> {
    fn unsubscribe(&self, subscriber: SubscriberId) {
        if let Some(count) = self.remove(subscriber) {
            if let Some(on_unsubscribe) = &self.config.on_unsubscribe {
                on_unsubscribe(count);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

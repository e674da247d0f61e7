//! Batching Coordinator
//!
//! While a batch is open, writes do not notify. Each write queues the
//! signal's current subscribers into a pending set keyed by subscriber ID,
//! so a subscriber watching several written signals, or one signal written
//! several times, is queued once. When the outermost batch closes the pending
//! subscribers fire synchronously, in the order they were first queued.
//!
//! Nested batches flatten into the outermost one: an inner batch closing does
//! not end the outer batch.

use std::cell::{Cell, RefCell};

use indexmap::IndexMap;

use super::runtime::ReactiveRuntime;
use super::subscriber::{Subscriber, SubscriberId};
use crate::error::{keep_first, Result};

/// Batch depth and the subscribers waiting for the batch to close.
#[derive(Default)]
pub struct BatchState {
    depth: Cell<usize>,
    pending: RefCell<IndexMap<SubscriberId, Subscriber>>,
}

impl BatchState {
    /// True while at least one batch is open.
    pub fn is_batching(&self) -> bool {
        self.depth.get() > 0
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Queue subscribers for delivery when the batch closes.
    pub fn enqueue<I>(&self, subscribers: I)
    where
        I: IntoIterator<Item = Subscriber>,
    {
        let mut pending = self.pending.borrow_mut();
        for subscriber in subscribers {
            pending.entry(subscriber.id()).or_insert(subscriber);
        }
    }

    /// Number of subscribers waiting for delivery.
    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    fn take_pending(&self) -> IndexMap<SubscriberId, Subscriber> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }
}

/// Closes one batch level, also when the body panics.
struct BatchScope<'a> {
    state: &'a BatchState,
}

impl<'a> BatchScope<'a> {
    fn open(state: &'a BatchState) -> Self {
        state.depth.set(state.depth.get() + 1);
        Self { state }
    }
}

impl Drop for BatchScope<'_> {
    fn drop(&mut self) {
        self.state.depth.set(self.state.depth.get().saturating_sub(1));
    }
}

/// Run `body` as a batch on `runtime`.
///
/// The body's own error is reported ahead of any subscriber error; pending
/// subscribers are delivered either way since the writes already happened.
pub(crate) fn run_batch<R>(
    runtime: &ReactiveRuntime,
    body: impl FnOnce() -> Result<R>,
) -> Result<R> {
    let state = runtime.batch_state();

    let outcome = {
        let _scope = BatchScope::open(state);
        body()
    };

    if state.is_batching() {
        return outcome;
    }

    let pending = state.take_pending();
    if !pending.is_empty() {
        tracing::debug!(subscribers = pending.len(), "flushing batched notifications");
    }

    let mut first_error = None;
    for (_, subscriber) in pending {
        keep_first(&mut first_error, subscriber.notify());
    }

    match outcome {
        Err(err) => {
            if let Some(dropped) = first_error {
                tracing::error!(error = %dropped, "subscriber failed after batch body error");
            }
            Err(err)
        }
        Ok(value) => first_error.map_or(Ok(value), Err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::ReactiveError;
    use std::rc::Rc;

    fn counting(count: &Rc<Cell<u32>>) -> Subscriber {
        let count = count.clone();
        Subscriber::new(move || {
            count.set(count.get() + 1);
            Ok(())
        })
    }

    #[test]
    fn pending_set_deduplicates_by_id() {
        let state = BatchState::default();
        let count = Rc::new(Cell::new(0));
        let subscriber = counting(&count);

        state.enqueue([subscriber.clone(), subscriber.clone()]);
        state.enqueue([subscriber]);
        assert_eq!(state.pending_len(), 1);
    }

    #[test]
    fn flushes_once_when_outermost_batch_closes() {
        let rt = ReactiveRuntime::new(RuntimeConfig::default());
        let count = Rc::new(Cell::new(0));
        let subscriber = counting(&count);

        run_batch(&rt, || {
            rt.batch_state().enqueue([subscriber.clone()]);
            run_batch(&rt, || {
                rt.batch_state().enqueue([subscriber.clone()]);
                Ok(())
            })?;
            // Inner batch closed but the outer one is still open.
            assert!(rt.batch_state().is_batching());
            assert_eq!(count.get(), 0);
            Ok(())
        })
        .unwrap();

        assert_eq!(count.get(), 1);
        assert!(!rt.batch_state().is_batching());
        assert_eq!(rt.batch_state().pending_len(), 0);
    }

    #[test]
    fn body_error_still_delivers_pending() {
        let rt = ReactiveRuntime::new(RuntimeConfig::default());
        let count = Rc::new(Cell::new(0));
        let subscriber = counting(&count);

        let result: Result<()> = run_batch(&rt, || {
            rt.batch_state().enqueue([subscriber.clone()]);
            Err(ReactiveError::SubscriberLimit { limit: 0 })
        });

        assert!(result.unwrap_err().is_subscriber_limit());
        assert_eq!(count.get(), 1);
        assert_eq!(rt.batch_state().depth(), 0);
    }
}

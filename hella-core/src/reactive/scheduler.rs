//! Notification Scheduler
//!
//! Two deferred queues drive everything that does not happen synchronously:
//!
//! - The **microtask queue** holds the first run of non-immediate effects.
//!   It is drained with [`Scheduler::run_microtasks`], and automatically after
//!   every frame.
//!
//! - The **frame queue** holds at most one notification task per signal.
//!   Writing the same signal several times before the frame boundary keeps the
//!   first task and drops the rest, so subscribers fire once per frame. The
//!   task looks up the subscriber set when it fires, not when it was queued.
//!
//! Nothing here knows about wall-clock time. A frame boundary is whatever calls
//! [`Scheduler::advance_frame`]: a test, a host event loop, or the tokio-based
//! [`FrameDriver`](crate::FrameDriver).

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use indexmap::map::Entry;
use indexmap::IndexMap;

use super::subscriber::SignalId;
use crate::error::{keep_first, Result};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() -> Result<()>>;

/// Microtask and frame queues for one runtime.
#[derive(Default)]
pub struct Scheduler {
    microtasks: RefCell<VecDeque<Task>>,
    frame_tasks: RefCell<IndexMap<SignalId, Task>>,
    frames: Cell<u64>,
}

impl Scheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue work for the next microtask checkpoint.
    pub fn queue_microtask(&self, task: Task) {
        self.microtasks.borrow_mut().push_back(task);
    }

    /// Queue a notification for the next frame, coalesced by signal.
    ///
    /// Returns false if the signal already had a task queued for this frame.
    pub fn schedule_frame(&self, key: SignalId, task: Task) -> bool {
        match self.frame_tasks.borrow_mut().entry(key) {
            Entry::Occupied(_) => {
                tracing::trace!(signal = key.raw(), "notification already queued");
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(task);
                tracing::trace!(signal = key.raw(), "notification queued for next frame");
                true
            }
        }
    }

    /// Drain the microtask queue, including microtasks queued while draining.
    ///
    /// Every task runs; the first error is returned.
    pub fn run_microtasks(&self) -> Result<usize> {
        let mut ran = 0;
        let mut first_error = None;

        loop {
            // The borrow must end before the task runs: tasks queue more work.
            let next = self.microtasks.borrow_mut().pop_front();
            let Some(task) = next else { break };
            keep_first(&mut first_error, task());
            ran += 1;
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(ran),
        }
    }

    /// Cross one frame boundary.
    ///
    /// Runs the notification tasks queued before this call, in the order their
    /// signals were first written, then drains microtasks. Notifications queued
    /// while the frame runs wait for the next frame.
    pub fn advance_frame(&self) -> Result<usize> {
        let tasks = std::mem::take(&mut *self.frame_tasks.borrow_mut());
        let frame = self.frames.get() + 1;
        self.frames.set(frame);

        tracing::trace!(frame, tasks = tasks.len(), "advancing frame");

        let mut ran = 0;
        let mut first_error = None;
        for (_, task) in tasks {
            keep_first(&mut first_error, task());
            ran += 1;
        }
        keep_first(&mut first_error, self.run_microtasks().map(|_| ()));

        match first_error {
            Some(err) => Err(err),
            None => Ok(ran),
        }
    }

    /// True if neither queue holds work.
    pub fn is_idle(&self) -> bool {
        self.microtasks.borrow().is_empty() && self.frame_tasks.borrow().is_empty()
    }

    /// Number of signals waiting for the next frame.
    pub fn pending_frame_tasks(&self) -> usize {
        self.frame_tasks.borrow().len()
    }

    /// Number of queued microtasks.
    pub fn pending_microtasks(&self) -> usize {
        self.microtasks.borrow().len()
    }

    /// Frames crossed so far.
    pub fn frame_count(&self) -> u64 {
        self.frames.get()
    }
}

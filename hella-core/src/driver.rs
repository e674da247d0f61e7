//! Frame Driver
//!
//! The runtime's frame clock is advanced explicitly. Hosts with a render loop
//! call [`ReactiveRuntime::advance_frame`] once per frame; everything else can
//! let a [`FrameDriver`] do it from a tokio interval.
//!
//! The runtime is `!Send`, so the driver's futures must be awaited on the
//! thread that owns the runtime: directly under a current-thread runtime, or
//! through `tokio::task::spawn_local` inside a `LocalSet`.

use std::time::Duration;

use tokio::time::{self, Interval, MissedTickBehavior};

use crate::error::{keep_first, Result};
use crate::reactive::ReactiveRuntime;

/// Advances a runtime's frames on a fixed period.
#[derive(Debug, Clone)]
pub struct FrameDriver {
    runtime: ReactiveRuntime,
    interval: Duration,
}

impl FrameDriver {
    /// Drive `runtime` at its configured frame interval.
    pub fn new(runtime: ReactiveRuntime) -> Self {
        let interval = runtime.config().frame_interval();
        Self { runtime, interval }
    }

    /// Override the frame period.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The runtime being driven.
    pub fn runtime(&self) -> &ReactiveRuntime {
        &self.runtime
    }

    /// Process exactly `frames` frames, one per tick.
    ///
    /// Every frame is processed even if an earlier one fails; the first error
    /// is returned.
    pub async fn run_frames(&self, frames: usize) -> Result<()> {
        let mut ticker = self.ticker();
        let mut first_error = None;
        for _ in 0..frames {
            ticker.tick().await;
            keep_first(&mut first_error, self.frame());
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Tick until no notification or microtask is left, returning the number
    /// of frames processed.
    ///
    /// Stops after `max_flush_frames` frames, like
    /// [`ReactiveRuntime::flush`].
    pub async fn run_until_idle(&self) -> Result<usize> {
        let max_frames = self.runtime.config().max_flush_frames;
        let mut ticker = self.ticker();
        let mut first_error = None;

        keep_first(&mut first_error, self.runtime.run_microtasks().map(drop));
        let mut frames = 0;
        while !self.runtime.is_idle() && frames < max_frames {
            ticker.tick().await;
            keep_first(&mut first_error, self.frame());
            frames += 1;
        }

        if !self.runtime.is_idle() {
            tracing::warn!(frames, "frame driver stopped with notifications still queued");
        }

        first_error.map_or(Ok(frames), Err)
    }

    /// Run forever. Frame errors are logged and do not stop the clock.
    pub async fn run(self) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "frame driver started");
        let mut ticker = self.ticker();
        loop {
            ticker.tick().await;
            if let Err(err) = self.frame() {
                tracing::error!(error = %err, frame = self.runtime.frame_count(), "frame failed");
            }
        }
    }

    fn ticker(&self) -> Interval {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    /// One frame: pending microtasks first, then the frame queue.
    fn frame(&self) -> Result<()> {
        let mut first_error = None;
        keep_first(&mut first_error, self.runtime.run_microtasks().map(drop));
        keep_first(&mut first_error, self.runtime.advance_frame().map(drop));
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::reactive::{EffectOptions, SignalConfig};
    use std::cell::Cell;
    use std::rc::Rc;

    fn driver() -> FrameDriver {
        FrameDriver::new(ReactiveRuntime::new(RuntimeConfig::default()))
            .with_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn run_frames_delivers_notifications() {
        let driver = driver();
        let rt = driver.runtime().clone();
        let source = rt.signal(0, SignalConfig::default());
        let seen = Rc::new(Cell::new(0));

        let (source_clone, seen_clone) = (source.clone(), seen.clone());
        let _effect = rt
            .effect(
                move || {
                    seen_clone.set(source_clone.get()?);
                    Ok(())
                },
                EffectOptions::immediate(),
            )
            .unwrap();

        source.set(3).unwrap();
        assert_eq!(seen.get(), 0);

        driver.run_frames(1).await.unwrap();
        assert_eq!(seen.get(), 3);
        assert_eq!(rt.frame_count(), 1);
    }

    #[tokio::test]
    async fn run_until_idle_drains_chained_updates() {
        let driver = driver();
        let rt = driver.runtime().clone();
        let first = rt.signal(0, SignalConfig::default());
        let second = rt.signal(0, SignalConfig::default());

        let (first_clone, second_clone) = (first.clone(), second.clone());
        let _forward = rt
            .effect(
                move || second_clone.set(first_clone.get()? * 2),
                EffectOptions::deferred(),
            )
            .unwrap();

        let frames = driver.run_until_idle().await.unwrap();
        assert_eq!(frames, 0);

        second.get().unwrap();
        first.set(4).unwrap();
        let frames = driver.run_until_idle().await.unwrap();
        assert_eq!(frames, 2);
        assert_eq!(second.get().unwrap(), 8);
        assert!(rt.is_idle());
    }

    #[tokio::test]
    async fn run_until_idle_is_bounded_for_self_feeding_effects() {
        let mut config = RuntimeConfig::default();
        config.max_flush_frames = 3;
        let driver = FrameDriver::new(ReactiveRuntime::new(config))
            .with_interval(Duration::from_millis(1));
        let rt = driver.runtime().clone();
        let counter = rt.signal(0u32, SignalConfig::default());

        let counter_clone = counter.clone();
        let _effect = rt
            .effect(
                move || {
                    let value = counter_clone.get()?;
                    counter_clone.set(value + 1)
                },
                EffectOptions::immediate(),
            )
            .unwrap();

        assert_eq!(driver.run_until_idle().await.unwrap(), 3);
        assert!(!rt.is_idle());
        assert_eq!(counter.get_untracked().unwrap(), 4);
    }

    #[tokio::test]
    async fn runs_inside_a_local_set() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let driver = driver();
                let rt = driver.runtime().clone();
                let count = rt.signal(0u32, SignalConfig::default());
                let hits = Rc::new(Cell::new(0));

                let hits_clone = hits.clone();
                let _sub = count.subscribe(move || hits_clone.set(hits_clone.get() + 1)).unwrap();
                count.set(1).unwrap();

                let handle = tokio::task::spawn_local(async move { driver.run_frames(2).await });
                handle.await.unwrap().unwrap();

                assert_eq!(hits.get(), 1);
                assert_eq!(rt.frame_count(), 2);
            })
            .await;
    }
}

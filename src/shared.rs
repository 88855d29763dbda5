//! A clock-reading `LoadTracker` handle that may be shared between threads.

use crate::error::Error;
use crate::hooks::{Clock, Hooks, TokioClock};
use crate::tracker::LoadTracker;
use crate::Load;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::trace;

/// Shares a `LoadTracker` between the loop driving it and the consumers reading it.
///
/// Each operation reads the `C`-typed clock and applies the whole read-modify-write to
/// the tracker under a lock. The load is queried as running whenever the tracker has
/// started and not been stopped, so readers need not know the state of the loop.
#[derive(Debug)]
pub struct Shared<C = TokioClock> {
    tracker: Arc<Mutex<LoadTracker>>,
    clock: C,
}

/// Ends a wait for I/O when dropped.
///
/// A guard only ends the wait it started. If the loop stopped or restarted in the
/// meantime, that wait was already discarded and dropping the guard does nothing.
///
/// Obtained from [`Shared::wait`].
#[derive(Debug)]
pub struct WaitGuard<'a, C: Clock> {
    shared: &'a Shared<C>,
    id: u64,
}

/// The fraction of recent time an event loop spent busy, in `[0.0, 1.0]`.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Utilization(f64);

// ===== impl Shared =====

impl Shared<TokioClock> {
    /// Shares `tracker`, reading time from tokio's clock.
    pub fn new(tracker: LoadTracker) -> Self {
        Self::with_clock(tracker, TokioClock)
    }
}

impl<C: Clock> Shared<C> {
    /// Shares `tracker`, reading time from `clock`.
    pub fn with_clock(tracker: LoadTracker, clock: C) -> Self {
        Shared {
            tracker: Arc::new(Mutex::new(tracker)),
            clock,
        }
    }

    /// The loop began running, or resumed after a stop.
    pub fn loop_start(&self) {
        let mut tracker = self.lock();
        tracker.on_loop_start(self.clock.now());
    }

    /// The loop is about to run a batch of ready work.
    pub fn tick_start(&self) -> Result<(), Error> {
        let mut tracker = self.lock();
        tracker.on_tick_start(self.clock.now())
    }

    /// The loop is about to block for I/O for at most `timeout`.
    pub fn wait_start(&self, timeout: Option<Duration>) -> Result<(), Error> {
        let mut tracker = self.lock();
        tracker.on_wait_start(self.clock.now(), timeout)
    }

    /// The loop returned from its wait for I/O.
    pub fn wait_end(&self) -> Result<(), Error> {
        let mut tracker = self.lock();
        tracker.on_wait_end(self.clock.now())
    }

    /// Starts a wait for I/O that ends when the returned guard is dropped.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<WaitGuard<'_, C>, Error> {
        let mut tracker = self.lock();
        let id = tracker.start_wait(self.clock.now(), timeout)?;
        Ok(WaitGuard { shared: self, id })
    }

    /// The loop finished a batch of ready work.
    pub fn tick_end(&self) -> Result<(), Error> {
        let mut tracker = self.lock();
        tracker.on_tick_end(self.clock.now())
    }

    /// The loop stopped running.
    pub fn loop_stop(&self) -> Result<(), Error> {
        let mut tracker = self.lock();
        tracker.on_loop_stop(self.clock.now())
    }

    /// Returns the smoothed load.
    ///
    /// # Errors
    ///
    /// Fails if the loop has not started yet.
    pub fn load(&self) -> Result<f64, Error> {
        let mut tracker = self.lock();
        let running = !tracker.is_stopped();
        tracker.load(self.clock.now(), running)
    }

    fn lock(&self) -> MutexGuard<'_, LoadTracker> {
        self.tracker.lock().expect("load tracker poisoned")
    }
}

impl<C: Clone> Clone for Shared<C> {
    fn clone(&self) -> Self {
        Shared {
            tracker: self.tracker.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<C: Clock> Load for Shared<C> {
    /// `None` until the loop has started.
    type Metric = Option<Utilization>;

    fn load(&self) -> Self::Metric {
        let load = Shared::load(self).ok().map(Utilization);
        trace!(?load, "loop load");
        load
    }
}

// ===== impl WaitGuard =====

impl<'a, C: Clock> Drop for WaitGuard<'a, C> {
    fn drop(&mut self) {
        let mut tracker = self.shared.lock();
        // The wait is in flight and the loop running whenever the ids match.
        let _ = tracker.end_wait(self.shared.clock.now(), self.id);
    }
}

// ===== impl Utilization =====

impl Utilization {
    /// Returns the load as a fraction in `[0.0, 1.0]`.
    pub fn get(self) -> f64 {
        self.0
    }
}

impl From<Utilization> for f64 {
    fn from(u: Utilization) -> f64 {
        u.0
    }
}

//! A `LoadTracker` that measures how busy an event loop is.

use crate::error::{Error, InvalidConfig, Violation};
use crate::hooks::Hooks;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// The decay period used by `LoadTracker::default`.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Estimates the load of a cooperative, single-threaded event loop.
///
/// The load is the fraction of recent time the loop spent running work rather than
/// blocked waiting for I/O. Idle time is collected from the loop's wait hooks and folded
/// into an exponentially smoothed estimate once per decay period: each step averages the
/// period's busy fraction with the prior estimate, so a reading has a half-life of one
/// period.
///
/// When the loop stalls or nobody asks for the load for a while, several periods may
/// have elapsed since the last update. Each of them is decayed independently, with the
/// idle time carried from one to the next, so a long idle gap is not averaged away into
/// a single step.
///
/// The tracker does no synchronization of its own and takes every timestamp as an
/// argument. See [`Shared`](crate::Shared) for a handle that reads a clock and may be
/// shared between threads.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadTracker {
    period: Duration,
    load: f64,
    /// Time through which decay has been applied. `None` until the loop starts.
    last_update: Option<Instant>,
    /// Idle time accrued since `last_update` that has not been folded into `load`.
    idle: Duration,
    pending: Option<PendingWait>,
    /// Number of waits started, used to identify the one in flight.
    waits: u64,
    stopped: bool,
}

/// An in-flight wait for I/O.
#[derive(Clone, Copy, Debug, PartialEq)]
struct PendingWait {
    id: u64,
    started_at: Instant,
    timeout: Option<Duration>,
}

// ===== impl LoadTracker =====

impl LoadTracker {
    /// Creates a tracker that applies one decay step per `period`.
    ///
    /// # Errors
    ///
    /// Returns a config validation error if `period` is zero.
    pub fn new(period: Duration) -> Result<Self, InvalidConfig> {
        Self::with_initial_load(period, 0.0)
    }

    /// Creates a tracker whose estimate starts at `initial` rather than `0.0`.
    ///
    /// # Errors
    ///
    /// Returns a config validation error if:
    /// - `period` is zero
    /// - `initial` is not within `[0.0, 1.0]`
    pub fn with_initial_load(period: Duration, initial: f64) -> Result<Self, InvalidConfig> {
        if period == Duration::ZERO {
            return Err(InvalidConfig::new("decay period must be non-zero"));
        }
        if !(0.0..=1.0).contains(&initial) {
            return Err(InvalidConfig::new("initial load must be within [0.0, 1.0]"));
        }

        Ok(LoadTracker {
            period,
            load: initial,
            last_update: None,
            idle: Duration::ZERO,
            pending: None,
            waits: 0,
            stopped: false,
        })
    }

    /// Returns the smoothed load, a value in `[0.0, 1.0]`.
    ///
    /// While the loop is running, any full decay periods that have elapsed since the last
    /// update are applied first. A loop that is not running returns its last estimate
    /// unchanged: a stopped loop does not accrue idle time.
    ///
    /// # Errors
    ///
    /// Fails if the loop never started, or if `is_running` is reported for a loop that
    /// was stopped and not restarted through `on_loop_start`.
    pub fn load(&mut self, now: Instant, is_running: bool) -> Result<f64, Error> {
        let last_update = self.last_update.ok_or_else(Error::uninitialized)?;

        if is_running {
            if self.stopped {
                return Err(violation(Violation::Stopped));
            }
            if elapsed(last_update, now) >= self.period {
                self.decay(last_update, now);
            }
        }

        Ok(self.load)
    }

    /// The decay period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// The time through which decay has been applied, if the loop has started.
    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    /// Idle time accrued since the last decay step that is not yet part of the estimate.
    pub fn pending_idle(&self) -> Duration {
        self.idle
    }

    /// Returns `true` while a wait for I/O is in flight.
    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns `true` once the loop has started at least once.
    pub fn is_initialized(&self) -> bool {
        self.last_update.is_some()
    }

    /// Returns `true` if the loop was stopped and has not been restarted.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Returns `last_update` if hooks may currently be applied.
    fn running(&self) -> Result<Instant, Error> {
        let last_update = self.last_update.ok_or_else(Error::uninitialized)?;
        if self.stopped {
            return Err(violation(Violation::Stopped));
        }
        Ok(last_update)
    }

    /// Starts a wait for I/O, returning an id that identifies it until it ends.
    pub(crate) fn start_wait(
        &mut self,
        now: Instant,
        timeout: Option<Duration>,
    ) -> Result<u64, Error> {
        self.running()?;
        if self.pending.is_some() {
            return Err(violation(Violation::WaitPending));
        }
        self.waits = self.waits.wrapping_add(1);
        self.pending = Some(PendingWait {
            id: self.waits,
            started_at: now,
            timeout,
        });
        Ok(self.waits)
    }

    /// Ends the wait `id` if it is still in flight.
    ///
    /// Returns `false` without touching the tracker if that wait was already discarded
    /// by a stop or restart.
    pub(crate) fn end_wait(&mut self, now: Instant, id: u64) -> Result<bool, Error> {
        match self.pending {
            Some(wait) if wait.id == id => self.on_wait_end(now).map(|()| true),
            _ => {
                debug!(wait = id, "wait already discarded");
                Ok(false)
            }
        }
    }

    /// Applies one decay step per full period elapsed since `last_update`.
    fn decay(&mut self, last_update: Instant, now: Instant) {
        let period = self.period.as_secs_f64();
        let mut remaining = elapsed(last_update, now);

        while remaining >= self.period {
            let idle = self.idle.min(self.period);
            let instant = 1.0 - idle.as_secs_f64() / period;
            let next = (instant + self.load) / 2.0;
            trace!(
                idle = ?idle,
                instant,
                prior = self.load,
                next,
                "decay step"
            );
            self.load = next;
            remaining -= self.period;
            self.idle = self.idle.saturating_sub(self.period);
        }

        // The leftover partial period is counted by the next update.
        self.last_update = Some(now - remaining);
    }
}

impl Default for LoadTracker {
    fn default() -> Self {
        LoadTracker::new(DEFAULT_PERIOD).expect("default decay period is non-zero")
    }
}

impl Hooks for LoadTracker {
    fn on_loop_start(&mut self, now: Instant) {
        if self.pending.take().is_some() {
            debug!("discarding wait left in flight before restart");
        }
        self.last_update = Some(now);
        self.idle = Duration::ZERO;
        self.stopped = false;
        debug!(period = ?self.period, load = self.load, "loop started");
    }

    fn on_tick_start(&mut self, _now: Instant) -> Result<(), Error> {
        self.running()?;
        if self.pending.is_some() {
            return Err(violation(Violation::WaitPending));
        }
        Ok(())
    }

    fn on_wait_start(&mut self, now: Instant, timeout: Option<Duration>) -> Result<(), Error> {
        self.start_wait(now, timeout).map(|_| ())
    }

    fn on_wait_end(&mut self, now: Instant) -> Result<(), Error> {
        self.running()?;
        let wait = self
            .pending
            .take()
            .ok_or_else(|| violation(Violation::NoWaitPending))?;

        let waited = elapsed(wait.started_at, now);
        // A loop woken up past its deadline was busy with something other than I/O for
        // the overrun.
        let credit = match wait.timeout {
            Some(timeout) => waited.min(timeout),
            None => waited,
        };
        trace!(waited = ?waited, timeout = ?wait.timeout, credit = ?credit, "wait ended");
        self.idle = self.idle.saturating_add(credit);
        Ok(())
    }

    fn on_tick_end(&mut self, now: Instant) -> Result<(), Error> {
        let last_update = self.running()?;
        if elapsed(last_update, now) >= self.period {
            self.decay(last_update, now);
        }
        Ok(())
    }

    fn on_loop_stop(&mut self, now: Instant) -> Result<(), Error> {
        let last_update = self.running()?;
        if elapsed(last_update, now) >= self.period {
            self.decay(last_update, now);
        }
        if self.pending.take().is_some() {
            debug!("discarding wait in flight at loop stop");
        }
        self.stopped = true;
        debug!(load = self.load, "loop stopped");
        Ok(())
    }
}

/// Time from `since` to `now`, clamped at zero if the clock went backwards.
fn elapsed(since: Instant, now: Instant) -> Duration {
    if now < since {
        debug!(behind = ?(since - now), "clock moved backwards; treating as no time elapsed");
    }
    now.saturating_duration_since(since)
}

fn violation(violation: Violation) -> Error {
    warn!(%violation, "loop hook called out of order");
    Error::protocol(violation)
}

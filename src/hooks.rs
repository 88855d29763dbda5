use crate::error::Error;
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle hooks an event loop invokes as it runs.
///
/// A driver integrating with a scheduler calls these at fixed points of its run loop, in
/// this order:
///
/// ```text
/// on_loop_start → (on_tick_start? → on_wait_start → on_wait_end → on_tick_end*)* → on_loop_stop?
/// ```
///
/// Waits never overlap. Every hook receives the time it was called at, read from a
/// monotonic clock; implementations never look up a clock on their own.
///
/// Hooks return an [`Error`] when they are called out of that order. A driver that gets
/// one has a bug in its integration and should surface it rather than retry.
pub trait Hooks {
    /// The loop began running, or resumed after a stop.
    fn on_loop_start(&mut self, now: Instant);

    /// The loop is about to run a batch of ready work.
    fn on_tick_start(&mut self, now: Instant) -> Result<(), Error>;

    /// The loop is about to block waiting for I/O for at most `timeout`, or without a
    /// limit if `timeout` is `None`.
    fn on_wait_start(&mut self, now: Instant, timeout: Option<Duration>) -> Result<(), Error>;

    /// The loop returned from its wait for I/O.
    fn on_wait_end(&mut self, now: Instant) -> Result<(), Error>;

    /// The loop finished a batch of ready work.
    fn on_tick_end(&mut self, now: Instant) -> Result<(), Error>;

    /// The loop stopped running.
    fn on_loop_stop(&mut self, now: Instant) -> Result<(), Error>;
}

/// A monotonic time source.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> Instant;
}

/// A `Clock` backed by tokio's time driver.
///
/// This honours `tokio::time::pause` and `tokio::time::advance`, so tests can drive a
/// tracker with a paused clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

// ===== impl Hooks =====

impl<'a, H: Hooks + ?Sized> Hooks for &'a mut H {
    fn on_loop_start(&mut self, now: Instant) {
        (**self).on_loop_start(now)
    }

    fn on_tick_start(&mut self, now: Instant) -> Result<(), Error> {
        (**self).on_tick_start(now)
    }

    fn on_wait_start(&mut self, now: Instant, timeout: Option<Duration>) -> Result<(), Error> {
        (**self).on_wait_start(now, timeout)
    }

    fn on_wait_end(&mut self, now: Instant) -> Result<(), Error> {
        (**self).on_wait_end(now)
    }

    fn on_tick_end(&mut self, now: Instant) -> Result<(), Error> {
        (**self).on_tick_end(now)
    }

    fn on_loop_stop(&mut self, now: Instant) -> Result<(), Error> {
        (**self).on_loop_stop(now)
    }
}

// ===== impl Clock =====

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<F> Clock for F
where
    F: Fn() -> Instant,
{
    fn now(&self) -> Instant {
        (self)()
    }
}

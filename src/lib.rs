#![doc(html_root_url = "https://docs.rs/loop-load/0.1.0")]
#![deny(missing_docs, rust_2018_idioms)]

//! Measures the load of a cooperative event loop.
//!
//! A [`LoadTracker`] is fed the lifecycle [`Hooks`] of a single-threaded scheduler and
//! derives from them a smoothed load in `[0.0, 1.0]`: the fraction of recent time the
//! loop spent running work rather than waiting for I/O. Consumers such as autoscalers
//! read it without sampling or polling the loop.
//!
//! ```
//! use loop_load::{Hooks, LoadTracker};
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! let t0 = Instant::now();
//! let mut tracker = LoadTracker::new(Duration::from_secs(1)).unwrap();
//!
//! tracker.on_loop_start(t0);
//! tracker.on_wait_start(t0, None).unwrap();
//! tracker.on_wait_end(t0 + Duration::from_millis(500)).unwrap();
//! tracker.on_tick_end(t0 + Duration::from_secs(1)).unwrap();
//!
//! assert_eq!(tracker.load(t0 + Duration::from_secs(1), true).unwrap(), 0.25);
//! ```

pub mod error;
mod hooks;
mod shared;
mod tracker;

pub use self::{
    error::{Error, InvalidConfig, Violation},
    hooks::{Clock, Hooks, TokioClock},
    shared::{Shared, Utilization, WaitGuard},
    tracker::{LoadTracker, DEFAULT_PERIOD},
};

/// Exposes a load metric.
pub trait Load {
    /// A comparable load metric. Lesser values are "preferable" to greater values.
    type Metric: PartialOrd;

    /// Obtains the current load.
    fn load(&self) -> Self::Metric;
}

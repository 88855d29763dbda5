#[path = "../support.rs"]
mod support;

use loop_load::{Error, Hooks, Load, LoadTracker, Shared, Utilization, Violation};
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_test::{assert_err, assert_ok};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// One turn of a scripted event loop.
#[derive(Clone, Copy, Debug)]
enum Turn {
    /// Run ready work for the given time.
    Work(Duration),
    /// Block for I/O for the given time, with an optional timeout.
    Wait(Duration, Option<Duration>),
}

/// A scheduler stand-in that reports its turns to `H`-typed hooks on the paused tokio
/// clock.
struct MockLoop<H> {
    hooks: H,
}

impl<H: Hooks> MockLoop<H> {
    fn start(mut hooks: H) -> Self {
        hooks.on_loop_start(Instant::now());
        MockLoop { hooks }
    }

    async fn run(&mut self, turns: &[Turn]) -> Result<(), Error> {
        for turn in turns {
            match *turn {
                Turn::Work(d) => {
                    self.hooks.on_tick_start(Instant::now())?;
                    time::advance(d).await;
                    self.hooks.on_tick_end(Instant::now())?;
                }
                Turn::Wait(d, timeout) => {
                    self.hooks.on_wait_start(Instant::now(), timeout)?;
                    time::advance(d).await;
                    self.hooks.on_wait_end(Instant::now())?;
                    self.hooks.on_tick_end(Instant::now())?;
                }
            }
        }
        Ok(())
    }
}

/// Shared handles forward each hook, ignoring the timestamp in favor of their clock.
struct ViaShared(Shared);

impl Hooks for ViaShared {
    fn on_loop_start(&mut self, _: Instant) {
        self.0.loop_start()
    }

    fn on_tick_start(&mut self, _: Instant) -> Result<(), Error> {
        self.0.tick_start()
    }

    fn on_wait_start(&mut self, _: Instant, timeout: Option<Duration>) -> Result<(), Error> {
        self.0.wait_start(timeout)
    }

    fn on_wait_end(&mut self, _: Instant) -> Result<(), Error> {
        self.0.wait_end()
    }

    fn on_tick_end(&mut self, _: Instant) -> Result<(), Error> {
        self.0.tick_end()
    }

    fn on_loop_stop(&mut self, _: Instant) -> Result<(), Error> {
        self.0.loop_stop()
    }
}

fn half_idle(periods: usize) -> Vec<Turn> {
    let mut turns = Vec::new();
    for _ in 0..periods {
        turns.push(Turn::Wait(ms(500), None));
        turns.push(Turn::Work(ms(250)));
        turns.push(Turn::Work(ms(250)));
    }
    turns
}

#[tokio::test(start_paused = true)]
async fn half_idle_loop() {
    let _t = support::trace_init();

    let mut tracker = LoadTracker::default();
    let mut el = MockLoop::start(&mut tracker);
    assert_ok!(el.run(&half_idle(3)).await);
    drop(el);

    let load = assert_ok!(tracker.load(Instant::now(), true));
    assert!((load - 0.5).abs() < 0.1, "load={}", load);
}

#[tokio::test(start_paused = true)]
async fn busy_then_idle() {
    let _t = support::trace_init();

    let shared = Shared::new(LoadTracker::default());
    let reader = shared.clone();
    let mut el = MockLoop::start(ViaShared(shared));

    assert_ok!(el.run(&[Turn::Work(ms(1_000)); 6]).await);
    let busy = reader.load().unwrap();
    assert!(busy > 0.98, "busy={}", busy);

    assert_ok!(el.run(&[Turn::Wait(ms(1_000), None); 6]).await);
    let idle = reader.load().unwrap();
    assert!(idle < 0.02, "idle={}", idle);

    assert_eq!(Load::load(&reader).map(Utilization::get), Some(idle));
}

#[tokio::test(start_paused = true)]
async fn overrun_waits_count_as_busy() {
    let _t = support::trace_init();

    // Both loops ask for 100ms; only the first wakes up on time.
    let on_time = [Turn::Wait(ms(100), Some(ms(100))), Turn::Work(ms(900))];
    let late = [Turn::Wait(ms(1_000), Some(ms(100)))];

    let mut honest = LoadTracker::default();
    let mut el = MockLoop::start(&mut honest);
    for _ in 0..4 {
        assert_ok!(el.run(&on_time).await);
    }
    drop(el);
    let honest = honest.load(Instant::now(), true).unwrap();

    let mut overrun = LoadTracker::default();
    let mut el = MockLoop::start(&mut overrun);
    for _ in 0..4 {
        assert_ok!(el.run(&late).await);
    }
    drop(el);
    let overrun = overrun.load(Instant::now(), true).unwrap();

    assert_eq!(honest, overrun);
    assert!(honest > 0.8);
}

#[tokio::test(start_paused = true)]
async fn long_stall_decays_every_period() {
    let _t = support::trace_init();

    let mut tracker = LoadTracker::with_initial_load(ms(1_000), 1.0).unwrap();
    let mut el = MockLoop::start(&mut tracker);

    // A single ten second wait, reported only when it ends.
    assert_ok!(el.run(&[Turn::Wait(ms(10_000), None)]).await);
    drop(el);

    let load = tracker.load(Instant::now(), true).unwrap();
    assert_eq!(load, 1.0 / 1024.0);
}

#[tokio::test(start_paused = true)]
async fn stop_and_restart() {
    let _t = support::trace_init();

    let shared = Shared::new(LoadTracker::default());
    let mut el = MockLoop::start(ViaShared(shared.clone()));
    assert_ok!(el.run(&half_idle(2)).await);
    assert_ok!(el.hooks.on_loop_stop(Instant::now()));

    let frozen = shared.load().unwrap();
    time::advance(ms(30_000)).await;
    assert_eq!(shared.load().unwrap(), frozen);

    let err = assert_err!(el.run(&[Turn::Work(ms(10))]).await);
    assert_eq!(err.violation(), Some(Violation::Stopped));

    el.hooks.on_loop_start(Instant::now());
    assert_ok!(el.run(&[Turn::Work(ms(1_000))]).await);
    assert!(shared.load().unwrap() > frozen);
}

#[test]
fn misbehaving_driver() {
    let _t = support::trace_init();

    let t0 = Instant::now();
    let mut tracker = LoadTracker::default();
    assert!(assert_err!(tracker.load(t0, true)).is_uninitialized());

    tracker.on_loop_start(t0);
    let before = tracker.clone();
    let err = assert_err!(tracker.on_wait_end(t0 + ms(10)));
    assert_eq!(err.violation(), Some(Violation::NoWaitPending));
    assert_eq!(tracker, before);
}

//! Playback pacing: turns stream time into real sleeps so records leave at the
//! rate they would play back.
//!
//! Two strategies share the [`Pacer`] trait:
//!
//! | Strategy | Sleep before a record at stream time `t` |
//! |----------|------------------------------------------|
//! | [`SourcePacer`] | `t - t_max`, for replaying pre-timestamped input |
//! | [`TickPacer`] | `start + t - now`, for generated content |
//!
//! Both clamp to zero and block in a single sleep, they never spin.

use log::{debug, trace};
use std::time::{Duration, Instant};

/// Time source of a pacer. Exists so tests can run without real sleeps.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

pub trait Pacer {
    /// Blocks until the record with stream time `at` is due and returns how long
    /// it slept.
    fn wait_for(&mut self, at: Duration) -> Duration;
}

/// Sleeps for the gap between consecutive record timestamps.
///
/// The reference point is the highest timestamp seen so far, so a record that
/// goes backwards is sent at once and the records after it are not delayed
/// twice for the same stretch of stream time.
pub struct SourcePacer<C = SystemClock> {
    clock: C,
    latest: Option<Duration>,
}

impl SourcePacer<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for SourcePacer<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> SourcePacer<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock, latest: None }
    }

    /// Delay owed before the record at `at`, without sleeping.
    pub fn delay_for(&mut self, at: Duration) -> Duration {
        let Some(latest) = self.latest else {
            self.latest = Some(at);
            return Duration::ZERO;
        };
        match at.checked_sub(latest) {
            Some(delay) => {
                self.latest = Some(at);
                delay
            }
            None => {
                debug!(
                    "Timestamp went backwards ({} ms after {} ms), sending without delay",
                    at.as_millis(),
                    latest.as_millis()
                );
                Duration::ZERO
            }
        }
    }
}

impl<C: Clock> Pacer for SourcePacer<C> {
    fn wait_for(&mut self, at: Duration) -> Duration {
        let delay = self.delay_for(at);
        if !delay.is_zero() {
            self.clock.sleep(delay);
        }
        delay
    }
}

/// `n × tick`, computed in one multiplication so no rounding error accumulates.
pub fn nth_tick(tick: Duration, n: u64) -> Duration {
    let nanos = tick.as_nanos() * n as u128;
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}

/// Sleeps until an absolute deadline computed from a fixed origin, so an overrun
/// in one tick is not carried into the next.
pub struct TickPacer<C = SystemClock> {
    clock: C,
    tick: Duration,
    start: Option<Instant>,
}

impl TickPacer<SystemClock> {
    pub fn new(tick: Duration) -> Self {
        Self::with_clock(SystemClock, tick)
    }
}

impl<C: Clock> TickPacer<C> {
    pub fn with_clock(clock: C, tick: Duration) -> Self {
        Self {
            clock,
            tick,
            start: None,
        }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Captures the origin. Called implicitly by the first wait.
    pub fn start(&mut self) -> Instant {
        *self.start.get_or_insert_with(|| self.clock.now())
    }

    /// Stream time of tick `n`.
    pub fn tick_time(&self, n: u64) -> Duration {
        nth_tick(self.tick, n)
    }

    pub fn deadline(&mut self, at: Duration) -> Instant {
        self.start() + at
    }

    /// Waits for tick `n`.
    pub fn wait_tick(&mut self, n: u64) -> Duration {
        let at = self.tick_time(n);
        self.wait_for(at)
    }
}

impl<C: Clock> Pacer for TickPacer<C> {
    fn wait_for(&mut self, at: Duration) -> Duration {
        let deadline = self.deadline(at);
        let delay = deadline.saturating_duration_since(self.clock.now());
        if delay.is_zero() {
            trace!("Behind schedule at {} ms, not sleeping", at.as_millis());
        } else {
            self.clock.sleep(delay);
        }
        delay
    }
}

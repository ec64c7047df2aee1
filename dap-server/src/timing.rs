//! Timing primitives of the probe.
//!
//! Bit clocking busy-waits; yielding to the scheduler would stretch clock phases
//! by whole time slices. Every sub-microsecond wait goes through [`busy_wait`], so a
//! platform with a better time source only has to replace this one function.
use std::time::{Duration, Instant};

/// Spins for at least `duration` without yielding.
#[inline]
pub fn busy_wait(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}

/// Half of one clock period, in nanoseconds, for a clock of `rate_hz`.
pub fn half_period_ns(rate_hz: u32) -> u32 {
    if rate_hz == 0 {
        return 0;
    }
    1_000_000_000 / rate_hz / 2
}

/// A point in time after which a polling loop gives up.
#[derive(Copy, Clone, Debug)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(timeout: Duration) -> Deadline {
        Deadline(Instant::now() + timeout)
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Calls `done` until it returns true or the deadline expires.
    /// Returns whether `done` succeeded.
    pub fn poll(&self, poll_interval: Duration, mut done: impl FnMut() -> bool) -> bool {
        loop {
            if done() {
                return true;
            }
            if self.expired() {
                return false;
            }
            busy_wait(poll_interval);
        }
    }
}

#[test]
fn half_period_of_common_rates() {
    assert_eq!(half_period_ns(1_000_000), 500);
    assert_eq!(half_period_ns(20_000), 25_000);
    assert_eq!(half_period_ns(3_000_000_000u64 as u32), 0);
    assert_eq!(half_period_ns(0), 0);
}

#[test]
fn deadline_poll_gives_up() {
    let deadline = Deadline::after(Duration::from_micros(200));
    let mut calls = 0;
    assert!(!deadline.poll(Duration::from_micros(1), || {
        calls += 1;
        false
    }));
    assert!(calls >= 1);
    assert!(deadline.expired());
}

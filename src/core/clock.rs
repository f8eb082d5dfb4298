use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, NaiveTime, Timelike};

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Wall-clock time and blocking sleep, swappable in tests.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;

    /// Returns `false` if the process was asked to stop before `duration`
    /// elapsed.
    fn sleep(&self, duration: Duration) -> bool;
}

/// Real clock. Sleeps in short slices so Ctrl+C is noticed promptly.
#[derive(Clone)]
pub struct SystemClock {
    running: Arc<AtomicBool>,
}

impl SystemClock {
    pub fn new(running: Arc<AtomicBool>) -> Self {
        Self { running }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while self.running.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
        false
    }
}

/// Delay from `now` until `lead` before the next `window`-aligned boundary
/// of the day. When `now` is already inside the lead, the boundary after
/// that is used.
pub fn delay_until_window(now: NaiveTime, window: Duration, lead: Duration) -> Duration {
    let window_ns = window.as_nanos();
    if window_ns == 0 {
        return Duration::ZERO;
    }

    let of_day_ns = u128::from(now.num_seconds_from_midnight()) * 1_000_000_000
        + u128::from(now.nanosecond().min(999_999_999));
    let into_window = Duration::from_nanos((of_day_ns % window_ns) as u64);
    let to_boundary = window - into_window;

    if to_boundary > lead {
        to_boundary - lead
    } else {
        to_boundary + window.saturating_sub(lead)
    }
}

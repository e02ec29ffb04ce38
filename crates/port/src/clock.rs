//! Monotonic clock services.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Rate of the hosted tick counter, in ticks per second.
pub const TICK_RATE_HZ: u64 = 1000;

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

pub(crate) fn init() {
    let _ = epoch();
}

/// Milliseconds elapsed since the port epoch.
pub fn tick_ms() -> u64 {
    epoch().elapsed().as_millis() as u64
}

/// Ticks elapsed since the port epoch.
pub fn tick() -> u64 {
    tick_ms() * TICK_RATE_HZ / 1000
}

/// Blocks the calling task for `ms` milliseconds.
pub fn sleep(ms: u64) {
    std::thread::sleep(Duration::from_millis(ms));
}

/// Gives up the remainder of the calling task's time slice.
pub fn yield_now() {
    std::thread::yield_now();
}

/// Converts a millisecond tick back into an instant.
pub(crate) fn instant_at(ms: u64) -> Instant {
    epoch() + Duration::from_millis(ms)
}

/// Converts an instant into a millisecond tick.
pub(crate) fn ms_at(instant: Instant) -> u64 {
    instant.saturating_duration_since(epoch()).as_millis() as u64
}

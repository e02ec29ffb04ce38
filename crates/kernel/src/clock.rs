//! Millisecond time source used to stamp dispatched events.
//!
//! Hosted builds read the port's monotonic clock. Bare-metal builds keep a
//! software counter that the application advances from its tick interrupt.

#[cfg(not(feature = "std"))]
use core::cell::Cell;

#[cfg(not(feature = "std"))]
static NOW_MS: critical_section::Mutex<Cell<u64>> = critical_section::Mutex::new(Cell::new(0));

/// Milliseconds since start-up.
#[cfg(feature = "std")]
pub fn now_ms() -> u64 {
    embra_port::tick_ms()
}

/// Milliseconds since start-up, as advanced through [`advance`].
#[cfg(not(feature = "std"))]
pub fn now_ms() -> u64 {
    critical_section::with(|cs| NOW_MS.borrow(cs).get())
}

/// Advances the software clock. Safe to call from interrupt context.
#[cfg(not(feature = "std"))]
pub fn advance(ms: u64) {
    critical_section::with(|cs| {
        let now = NOW_MS.borrow(cs);
        now.set(now.get().wrapping_add(ms));
    });
}

/// Blocks the caller for `ms` milliseconds.
#[cfg(feature = "std")]
pub fn sleep(ms: u64) {
    embra_port::sleep(ms);
}

//! # embra-port
//!
//! Platform port for the embra runtime. The kernel consumes a small set of
//! platform services: a monotonic clock, critical sections, task creation,
//! a counting wake primitive and one-shot/continuous timers. This crate
//! implements them for hosted targets on top of the standard library so the
//! kernel can be exercised in an ordinary desktop process.
//!
//! ## Module Overview
//! - [`clock`] – Monotonic tick and millisecond readers, sleep and yield.
//! - [`task`]  – Named task creation and joining.
//! - [`event`] – Counting wake primitive with timed waits.
//! - [`timer`] – Timer service backed by a dedicated task per timer.
//!
//! Critical sections are provided through the [`critical-section`] crate; this
//! port enables its `std` implementation.
//!
//! [`critical-section`]: https://docs.rs/critical-section

pub mod clock;
mod error;
pub mod event;
pub mod task;
pub mod timer;

pub use clock::{sleep, tick, tick_ms, yield_now, TICK_RATE_HZ};
pub use error::PortError;
pub use event::RawEventHandle;
pub use task::{spawn_task, TaskAttributes, TaskHandle};
pub use timer::{PlatformTimer, TimerCallback, TimerMode};

pub use critical_section::CriticalSection;

/// Runs `f` with preemption disabled process-wide.
///
/// On the hosted port this acquires the global critical-section lock; nested
/// calls from the same thread are allowed.
#[inline]
pub fn critical<R>(f: impl FnOnce(CriticalSection<'_>) -> R) -> R {
    critical_section::with(f)
}

/// Initializes the port. Calling it is optional; the clock epoch is otherwise
/// fixed by the first clock read.
pub fn init() {
    clock::init();
    log::debug!("hosted port initialized at {} Hz", TICK_RATE_HZ);
}

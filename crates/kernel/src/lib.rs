//! # embra-kernel
//!
//! Concurrency and scheduling substrate of the embra runtime. Everything here
//! runs on top of a handful of platform services (critical sections, a wake
//! primitive, task creation and timers) supplied by [`embra_port`] on hosted
//! targets.
//!
//! ## Module Overview
//! - [`atomic`]      – Critical-section or hardware backed atomic integers.
//! - [`guard`]       – Scoped, unique and try-lock guards over any [`RawLock`].
//! - [`lock`]        – Optionally recursive blocking lock (`std`).
//! - [`event`]       – Wait/signal primitive with a waiter count (`std`).
//! - [`thread`]      – Named threads running a [`Runnable`](thread::Runnable) (`std`).
//! - [`timer`]       – One-shot and continuous timers (`std`).
//! - [`policy`]      – Single- and multi-threaded policies selecting the above.
//! - [`dispatch`]    – Retry-capable work dispatch queue.
//! - [`event_queue`] – Named handlers dispatched through a work queue.
//! - [`timed`]       – Tick-driven scheduler on top of the event queue.
//!
//! Without the `std` feature the crate is `no_std + alloc`; only the
//! single-threaded policy is available and the `lock-free` feature supplies
//! the internal spin lock.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(all(not(feature = "std"), not(feature = "lock-free")))]
compile_error!("embra-kernel needs either the `std` or the `lock-free` feature");

pub mod atomic;
pub mod clock;
pub mod dispatch;
mod error;
pub mod event_queue;
pub mod guard;
pub mod policy;
pub(crate) mod sync;
pub mod timed;
pub mod timeout;
pub mod watchdog;

#[cfg(feature = "std")]
pub mod event;
#[cfg(feature = "std")]
pub mod lock;
#[cfg(feature = "std")]
pub mod thread;
#[cfg(feature = "std")]
pub mod timer;

pub use atomic::{Atomic, AtomicBool};
pub use dispatch::{Completion, DispatchQueue, QueueConfig, QueueConfigBuilder};
pub use error::{KernelError, KernelResult};
pub use event_queue::EventQueue;
pub use guard::{ScopedLock, UniqueLock, UniqueTryLock};
pub use policy::{CriticalLock, DefaultThreading, LockCell, RawEvent, RawLock, SingleThreading, Threading, Worker};
pub use timed::{TimedQueueConfig, TimerEventQueue};
pub use timeout::Timeout;
pub use watchdog::{NoWatchdog, Watchdog};

#[cfg(feature = "std")]
pub use event::Event;
#[cfg(feature = "std")]
pub use lock::Lock;
#[cfg(feature = "std")]
pub use policy::MultiThreading;
#[cfg(feature = "std")]
pub use thread::{Runnable, StopToken, Thread, ThreadBuilder, ThreadConfig};
#[cfg(feature = "std")]
pub use timer::{Timer, TimerConfig, TimerMode, TimerTick};

#[cfg(test)]
mod tests;

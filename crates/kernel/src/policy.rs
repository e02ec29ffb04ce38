//! Threading policies.
//!
//! Queues and state machines are generic over a [`Threading`] policy that
//! names the lock, event and thread types they are built from. The
//! single-threaded policy targets bare-metal systems: its lock is a
//! critical section, its event never sleeps and its thread never runs, so a
//! queue's `enable`/`disable` compile down to nothing and the application
//! drives processing itself. The multi-threaded policy (`std`) uses the real
//! [`Lock`](crate::lock::Lock), [`Event`](crate::event::Event) and
//! [`Thread`](crate::thread::Thread).

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::RestoreState;

use crate::error::KernelResult;
use crate::timeout::Timeout;

/// A mutual-exclusion primitive with split lock/unlock calls.
///
/// # Safety
///
/// Implementations must guarantee that between a `lock` (or successful
/// `try_lock`) and the matching `unlock`, no other context can return from
/// `lock` or `try_lock` on the same object. `unlock` without a matching lock
/// must be harmless. A lock produced by `Default` must not be re-entrant:
/// locking it again from the holding context has to block or panic.
pub unsafe trait RawLock: Default + Send + Sync {
    fn lock(&self);
    fn try_lock(&self, timeout: Timeout) -> bool;
    fn unlock(&self);
}

/// Wait/signal primitive used to park queue and state-machine workers.
pub trait RawEvent: Default + Send + Sync {
    fn signal(&self);
    fn signal_from_irq(&self);

    /// Waits for a signal; returns false on timeout.
    fn wait(&self, timeout: Timeout) -> bool;

    /// Waits until `condition` holds or `timeout` elapses, returning the last
    /// value of `condition`.
    fn wait_for<F: FnMut() -> bool>(&self, condition: F, timeout: Timeout) -> bool;
}

/// A worker thread owned by a queue or state machine.
pub trait Worker: Send + 'static {
    fn named(name: &str) -> Self;

    /// Starts `body` on the worker.
    fn launch<F: FnMut() + Send + 'static>(&mut self, body: F) -> KernelResult<()>;

    /// Waits for the body to return.
    fn halt(&mut self);

    fn is_running(&self) -> bool;

    /// Pauses the calling worker for `ms` milliseconds.
    fn pause(ms: u32);
}

/// Compile-time selection of the concurrency primitives.
pub trait Threading: Send + Sync + 'static {
    /// True if the policy owns worker threads.
    const THREADED: bool;

    type Lock: RawLock;
    type Event: RawEvent;
    type Thread: Worker;
}

/// Policy for targets without a scheduler.
#[derive(Debug)]
pub enum SingleThreading {}

impl Threading for SingleThreading {
    const THREADED: bool = false;

    type Lock = CriticalLock;
    type Event = NoEvent;
    type Thread = NoThread;
}

/// Policy backed by the kernel's blocking primitives.
#[cfg(feature = "std")]
#[derive(Debug)]
pub enum MultiThreading {}

#[cfg(feature = "std")]
impl Threading for MultiThreading {
    const THREADED: bool = true;

    type Lock = crate::lock::Lock;
    type Event = crate::event::Event;
    type Thread = crate::thread::Thread;
}

#[cfg(feature = "std")]
pub type DefaultThreading = MultiThreading;
#[cfg(not(feature = "std"))]
pub type DefaultThreading = SingleThreading;

/// Lock that holds the global critical section while locked.
///
/// The lock is not re-entrant: acquiring it again from the holding context
/// panics. When several critical locks are held, release them in reverse
/// order of acquisition.
pub struct CriticalLock {
    locked: AtomicBool,
    restore: UnsafeCell<MaybeUninit<RestoreState>>,
}

// SAFETY: `restore` is only touched by the context that currently holds the
// critical section.
unsafe impl Sync for CriticalLock {}
unsafe impl Send for CriticalLock {}

impl CriticalLock {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
            restore: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl Default for CriticalLock {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: holding the lock means holding the global critical section, which
// excludes every other context until `unlock`.
unsafe impl RawLock for CriticalLock {
    fn lock(&self) {
        // SAFETY: released by `unlock`, or right here on re-entry, so acquire
        // and release stay properly nested.
        let state = unsafe { critical_section::acquire() };

        if self.locked.load(Ordering::Relaxed) {
            // Only the holder can get here while the flag is set.
            unsafe { critical_section::release(state) };
            panic!("critical lock acquired twice by its holder");
        }

        unsafe { (*self.restore.get()).write(state) };
        self.locked.store(true, Ordering::Relaxed);
    }

    fn try_lock(&self, _timeout: Timeout) -> bool {
        let state = unsafe { critical_section::acquire() };
        if self.locked.load(Ordering::Relaxed) {
            unsafe { critical_section::release(state) };
            return false;
        }

        unsafe { (*self.restore.get()).write(state) };
        self.locked.store(true, Ordering::Relaxed);
        true
    }

    fn unlock(&self) {
        let state = critical_section::with(|_| {
            if !self.locked.load(Ordering::Relaxed) {
                return None;
            }

            self.locked.store(false, Ordering::Relaxed);
            Some(unsafe { (*self.restore.get()).assume_init_read() })
        });

        if let Some(state) = state {
            // SAFETY: `state` came from the `acquire` in `lock`.
            unsafe { critical_section::release(state) };
        }
    }
}

/// Event that never blocks.
///
/// Waits return immediately; `wait_for` reports the condition as it stands.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvent;

impl RawEvent for NoEvent {
    fn signal(&self) {}

    fn signal_from_irq(&self) {}

    fn wait(&self, _timeout: Timeout) -> bool {
        false
    }

    fn wait_for<F: FnMut() -> bool>(&self, mut condition: F, _timeout: Timeout) -> bool {
        condition()
    }
}

/// Thread stand-in for the single-threaded policy. Never runs anything.
#[derive(Debug, Default)]
pub struct NoThread;

impl Worker for NoThread {
    fn named(_name: &str) -> Self {
        NoThread
    }

    fn launch<F: FnMut() + Send + 'static>(&mut self, _body: F) -> KernelResult<()> {
        Ok(())
    }

    fn halt(&mut self) {}

    fn is_running(&self) -> bool {
        false
    }

    fn pause(_ms: u32) {}
}

/// Data protected by a policy lock.
///
/// Calling [`with`](Self::with) on a cell from inside its own closure
/// panics or deadlocks, depending on the lock. Keep the closures short: under
/// the single-threaded policy they run with interrupts disabled.
pub struct LockCell<L: RawLock, T> {
    lock: L,
    value: UnsafeCell<T>,
}

// SAFETY: access to `value` is serialized by `lock`.
unsafe impl<L: RawLock, T: Send> Sync for LockCell<L, T> {}
unsafe impl<L: RawLock, T: Send> Send for LockCell<L, T> {}

impl<L: RawLock, T> LockCell<L, T> {
    pub fn new(value: T) -> Self {
        Self {
            lock: L::default(),
            value: UnsafeCell::new(value),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _guard = crate::guard::ScopedLock::new(&self.lock);
        // SAFETY: the guard gives exclusive access until it is dropped.
        f(unsafe { &mut *self.value.get() })
    }
}

impl<L: RawLock, T: Default> Default for LockCell<L, T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

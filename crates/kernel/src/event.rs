//! Wait/signal rendezvous.

use std::time::Instant;

use embra_port::RawEventHandle;

use crate::atomic::Atomic;
use crate::error::{KernelError, KernelResult};
use crate::guard::UniqueLock;
use crate::policy::{RawEvent, RawLock};
use crate::timeout::Timeout;

/// Number of signals an event can hold before further signals are dropped.
const DEFAULT_LENGTH: usize = 8;

/// A wait/signal primitive with an explicit waiter count.
///
/// `signal` only posts when somebody is waiting, so a signal sent while
/// nobody listens cannot satisfy an unrelated wait later on. Signals left
/// over from an earlier round are discarded when the first waiter arrives.
pub struct Event {
    raw: RawEventHandle,
    waiters: Atomic<usize>,
}

impl Event {
    pub fn new() -> Self {
        Self::with_length(DEFAULT_LENGTH)
    }

    pub fn with_length(length: usize) -> Self {
        Self {
            raw: RawEventHandle::new(length),
            waiters: Atomic::new(0),
        }
    }

    /// Number of contexts currently blocked on this event.
    pub fn waiters(&self) -> usize {
        self.waiters.load()
    }

    /// Wakes one waiter, if any.
    pub fn signal(&self) {
        if self.waiters.load() == 0 {
            return;
        }
        self.raw.signal();
    }

    /// Wakes one waiter from interrupt context. Never blocks.
    pub fn signal_from_irq(&self) {
        if self.waiters.load() == 0 {
            return;
        }
        self.raw.signal_from_irq();
    }

    /// Blocks until signalled.
    pub fn wait(&self) {
        // An unbounded wait only returns once signalled.
        let _ = self.wait_timeout(Timeout::FOREVER);
    }

    /// Blocks until signalled or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Timeout) -> KernelResult<()> {
        self.enter();
        let woken = self.raw.wait(timeout.as_duration());
        self.leave();

        if woken {
            Ok(())
        } else {
            Err(KernelError::Timeout)
        }
    }

    /// Releases `guard` while blocked and re-acquires it before returning.
    ///
    /// The caller is registered as a waiter before the lock is released, so a
    /// signal sent by whoever takes the lock next is not lost.
    pub fn wait_guarded<L: RawLock>(&self, guard: &mut UniqueLock<'_, L>, timeout: Timeout) -> KernelResult<()> {
        self.enter();
        guard.unlock();
        let woken = self.raw.wait(timeout.as_duration());
        guard.lock();
        self.leave();

        if woken {
            Ok(())
        } else {
            Err(KernelError::Timeout)
        }
    }

    /// Blocks until `condition` returns true or `timeout` elapses.
    ///
    /// `condition` is evaluated after registering as a waiter and after every
    /// wake-up. Returns the final value of `condition`.
    pub fn wait_for<F: FnMut() -> bool>(&self, mut condition: F, timeout: Timeout) -> bool {
        let deadline = timeout.as_duration().map(|tmo| Instant::now() + tmo);
        self.enter();

        let satisfied = loop {
            if condition() {
                break true;
            }

            let remaining = match deadline {
                None => None,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break false;
                    }
                    Some(deadline - now)
                }
            };

            if !self.raw.wait(remaining) {
                break condition();
            }
        };

        self.leave();
        satisfied
    }

    fn enter(&self) {
        if self.waiters.fetch_add(1) == 0 {
            self.raw.clear();
        }
    }

    fn leave(&self) {
        self.waiters.fetch_sub(1);
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl RawEvent for Event {
    fn signal(&self) {
        Event::signal(self);
    }

    fn signal_from_irq(&self) {
        Event::signal_from_irq(self);
    }

    fn wait(&self, timeout: Timeout) -> bool {
        self.wait_timeout(timeout).is_ok()
    }

    fn wait_for<F: FnMut() -> bool>(&self, condition: F, timeout: Timeout) -> bool {
        Event::wait_for(self, condition, timeout)
    }
}

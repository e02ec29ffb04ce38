//! Counting wake primitive.
//!
//! A [`RawEventHandle`] stores up to `length` pending signals. Each successful
//! wait consumes one. This is the hosted counterpart of an RTOS event queue of
//! the given length.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

pub struct RawEventHandle {
    pending: Mutex<usize>,
    cond: Condvar,
    length: usize,
}

impl RawEventHandle {
    pub fn new(length: usize) -> Self {
        Self {
            pending: Mutex::new(0),
            cond: Condvar::new(),
            length: length.max(1),
        }
    }

    /// Posts one signal, waking a single waiter.
    pub fn signal(&self) {
        let mut pending = self.pending.lock();
        if *pending < self.length {
            *pending += 1;
        }
        self.cond.notify_one();
    }

    /// Interrupt-context variant of [`signal`](Self::signal).
    ///
    /// The hosted port has no interrupt context; the lock below is only held
    /// for the counter update and never across a wait.
    pub fn signal_from_irq(&self) {
        self.signal();
    }

    /// Waits for a signal. `None` waits forever.
    ///
    /// Returns `true` if a signal was consumed, `false` on timeout.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|tmo| Instant::now() + tmo);
        let mut pending = self.pending.lock();

        loop {
            if *pending > 0 {
                *pending -= 1;
                return true;
            }

            match deadline {
                None => self.cond.wait(&mut pending),
                Some(deadline) => {
                    if self.cond.wait_until(&mut pending, deadline).timed_out() {
                        if *pending > 0 {
                            *pending -= 1;
                            return true;
                        }
                        return false;
                    }
                }
            }
        }
    }

    /// Drops every pending signal.
    pub fn clear(&self) {
        *self.pending.lock() = 0;
    }

    pub fn pending(&self) -> usize {
        *self.pending.lock()
    }
}

impl Default for RawEventHandle {
    fn default() -> Self {
        Self::new(1)
    }
}

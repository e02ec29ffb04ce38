//! Scope-bound lock guards.
//!
//! Every guard releases its lock exactly once when dropped, on normal return,
//! early return and unwinding alike. A guard that does not hold its lock at
//! drop time releases nothing.

use crate::policy::RawLock;
use crate::timeout::Timeout;

/// Timeout used by [`UniqueTryLock::new`].
pub const DEFAULT_TRY_TIMEOUT: Timeout = Timeout::from_millis(1000);

/// Holds a lock for its whole lifetime.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ScopedLock<'a, L: RawLock> {
    lock: &'a L,
}

impl<'a, L: RawLock> ScopedLock<'a, L> {
    pub fn new(lock: &'a L) -> Self {
        lock.lock();
        Self { lock }
    }
}

impl<L: RawLock> Drop for ScopedLock<'_, L> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

/// A guard that can release and re-acquire its lock mid-scope.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct UniqueLock<'a, L: RawLock> {
    lock: &'a L,
    locked: bool,
}

impl<'a, L: RawLock> UniqueLock<'a, L> {
    pub fn new(lock: &'a L) -> Self {
        lock.lock();
        Self { lock, locked: true }
    }

    /// Binds to `lock` without acquiring it.
    pub fn deferred(lock: &'a L) -> Self {
        Self { lock, locked: false }
    }

    pub fn lock(&mut self) {
        if !self.locked {
            self.lock.lock();
            self.locked = true;
        }
    }

    pub fn unlock(&mut self) {
        if self.locked {
            self.locked = false;
            self.lock.unlock();
        }
    }

    pub fn owns_lock(&self) -> bool {
        self.locked
    }

    pub fn mutex(&self) -> &'a L {
        self.lock
    }
}

impl<L: RawLock> Drop for UniqueLock<'_, L> {
    fn drop(&mut self) {
        self.unlock();
    }
}

/// A guard that tries to acquire its lock within a bound.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct UniqueTryLock<'a, L: RawLock> {
    lock: &'a L,
    locked: bool,
}

impl<'a, L: RawLock> UniqueTryLock<'a, L> {
    /// Tries for up to one second.
    pub fn new(lock: &'a L) -> Self {
        Self::with_timeout(lock, DEFAULT_TRY_TIMEOUT)
    }

    pub fn with_timeout(lock: &'a L, timeout: Timeout) -> Self {
        let locked = lock.try_lock(timeout);
        Self { lock, locked }
    }

    /// Returns true if the lock was acquired.
    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn unlock(&mut self) {
        if self.locked {
            self.locked = false;
            self.lock.unlock();
        }
    }
}

impl<L: RawLock> Drop for UniqueTryLock<'_, L> {
    fn drop(&mut self) {
        self.unlock();
    }
}

//! Blocking mutual exclusion.

use std::thread::{self, ThreadId};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::policy::RawLock;
use crate::timeout::Timeout;

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
}

/// A mutex with explicit `lock`/`unlock` calls and an optional recursive
/// mode.
///
/// Prefer the guards in [`crate::guard`] over calling `unlock` directly.
/// `unlock` on a lock that is not held is a no-op; unlocking a lock held by
/// another thread is a contract violation and panics.
#[derive(Debug)]
pub struct Lock {
    recursive: bool,
    state: Mutex<LockState>,
    released: Condvar,
}

impl Lock {
    pub fn new() -> Self {
        Self::with_mode(false)
    }

    /// A lock the owning thread may acquire several times.
    pub fn recursive() -> Self {
        Self::with_mode(true)
    }

    fn with_mode(recursive: bool) -> Self {
        Self {
            recursive,
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
        }
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().depth > 0
    }

    /// Blocks until the lock is acquired.
    ///
    /// # Panics
    ///
    /// Panics if a non-recursive lock is acquired again by its owner.
    pub fn lock(&self) {
        let acquired = self.acquire(Timeout::FOREVER);
        debug_assert!(acquired);
    }

    /// Tries to acquire the lock within `timeout`.
    ///
    /// Returns false if the lock could not be taken in time, including when a
    /// non-recursive lock is already held by the caller.
    pub fn try_lock(&self, timeout: Timeout) -> bool {
        let me = thread::current().id();
        {
            let state = self.state.lock();
            if !self.recursive && state.owner == Some(me) {
                return false;
            }
        }
        self.acquire(timeout)
    }

    pub fn unlock(&self) {
        let mut state = self.state.lock();
        if state.depth == 0 {
            return;
        }

        assert_eq!(
            state.owner,
            Some(thread::current().id()),
            "lock released by a thread that does not own it"
        );

        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_one();
        }
    }

    fn acquire(&self, timeout: Timeout) -> bool {
        let me = thread::current().id();
        let deadline = timeout.as_duration().map(|tmo| Instant::now() + tmo);
        let mut state = self.state.lock();

        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    return true;
                }
                Some(owner) if owner == me => {
                    assert!(self.recursive, "non-recursive lock acquired twice by its owner");
                    state.depth += 1;
                    return true;
                }
                Some(_) => match deadline {
                    None => self.released.wait(&mut state),
                    Some(deadline) => {
                        if self.released.wait_until(&mut state, deadline).timed_out()
                            && state.owner.is_some()
                        {
                            return false;
                        }
                    }
                },
            }
        }
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: ownership is tracked under the internal mutex and only one thread
// can be recorded as owner at a time.
unsafe impl RawLock for Lock {
    fn lock(&self) {
        Lock::lock(self);
    }

    fn try_lock(&self, timeout: Timeout) -> bool {
        Lock::try_lock(self, timeout)
    }

    fn unlock(&self) {
        Lock::unlock(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{ScopedLock, UniqueLock, UniqueTryLock};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn unlock_at_depth_zero_is_noop() {
        let lock = Lock::new();
        lock.unlock();
        assert!(!lock.is_locked());
    }

    #[test]
    fn recursive_lock_nests() {
        let lock = Lock::recursive();
        lock.lock();
        lock.lock();
        lock.unlock();
        assert!(lock.is_locked());
        lock.unlock();
        assert!(!lock.is_locked());
    }

    #[test]
    fn try_lock_times_out_while_held_elsewhere() {
        let lock = Arc::new(Lock::new());
        lock.lock();

        let contender = {
            let lock = Arc::clone(&lock);
            std::thread::spawn(move || lock.try_lock(Timeout::from_millis(20)))
        };

        assert!(!contender.join().unwrap());
        lock.unlock();
        assert!(lock.try_lock(Timeout::IMMEDIATE));
        lock.unlock();
    }

    #[test]
    fn try_lock_on_own_non_recursive_lock_fails() {
        let lock = Lock::new();
        lock.lock();
        assert!(!lock.try_lock(Timeout::IMMEDIATE));
        lock.unlock();
    }

    #[test]
    fn unique_lock_can_release_mid_scope() {
        let lock = Lock::new();
        let mut guard = UniqueLock::new(&lock);
        assert!(lock.is_locked());
        guard.unlock();
        assert!(!lock.is_locked());
        guard.lock();
        assert!(guard.owns_lock());
        drop(guard);
        assert!(!lock.is_locked());
    }

    #[test]
    fn failed_try_guard_never_releases() {
        let lock = Arc::new(Lock::new());
        let holder = {
            let lock = Arc::clone(&lock);
            std::thread::spawn(move || {
                let _held = ScopedLock::new(&*lock);
                std::thread::sleep(Duration::from_millis(60));
            })
        };

        std::thread::sleep(Duration::from_millis(10));
        {
            let guard = UniqueTryLock::with_timeout(&*lock, Timeout::from_millis(5));
            assert!(!guard.locked());
        }
        assert!(lock.is_locked());
        holder.join().unwrap();
        assert!(!lock.is_locked());
    }

    #[test]
    fn guard_releases_on_early_return_and_panic() {
        fn early(lock: &Lock, bail: bool) -> u32 {
            let _guard = ScopedLock::new(lock);
            if bail {
                return 1;
            }
            2
        }

        let lock = Lock::new();
        assert_eq!(early(&lock, true), 1);
        assert!(!lock.is_locked());
        assert_eq!(early(&lock, false), 2);
        assert!(!lock.is_locked());

        let shared = Arc::new(Lock::new());
        let worker = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                let _guard = ScopedLock::new(&*shared);
                panic!("mid-scope failure");
            })
        };
        assert!(worker.join().is_err());
        assert!(!shared.is_locked());
    }
}

//! Threads contending on a kernel lock.

use std::sync::Arc;

use embra_kernel::atomic::Atomic;
use embra_kernel::{Lock, ScopedLock, Thread};

#[test]
fn eight_threads_increment_under_lock() {
    const WORKERS: usize = 8;
    const INCREMENTS: i32 = 10_000;

    let lock = Arc::new(Lock::new());
    let total = Arc::new(Atomic::<i32>::new(0));

    let mut threads: Vec<Thread> = (0..WORKERS)
        .map(|index| {
            let lock = Arc::clone(&lock);
            let total = Arc::clone(&total);
            Thread::spawn(format!("worker-{index}"), move || {
                for _ in 0..INCREMENTS {
                    let _guard = ScopedLock::new(&*lock);
                    let current = total.load();
                    total.store(current + 1);
                }
            })
            .expect("spawn worker")
        })
        .collect();

    for thread in &mut threads {
        thread.join();
    }

    assert_eq!(total.load(), WORKERS as i32 * INCREMENTS);
    assert!(!lock.is_locked());
}

#[test]
fn recursive_lock_survives_nested_guards_across_threads() {
    let lock = Arc::new(Lock::recursive());
    let total = Arc::new(Atomic::<u32>::new(0));

    let mut threads: Vec<Thread> = (0..4)
        .map(|index| {
            let lock = Arc::clone(&lock);
            let total = Arc::clone(&total);
            Thread::spawn(format!("nested-{index}"), move || {
                for _ in 0..1_000 {
                    let _outer = ScopedLock::new(&*lock);
                    let _inner = ScopedLock::new(&*lock);
                    total.fetch_add(1);
                }
            })
            .expect("spawn worker")
        })
        .collect();

    for thread in &mut threads {
        thread.join();
    }

    assert_eq!(total.load(), 4_000);
    assert!(!lock.is_locked());
}

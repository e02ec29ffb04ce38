use std::sync::Arc;
use std::thread;

use crate::atomic::{Atomic, AtomicBool, AtomicI32};

#[test]
fn fetch_ops_return_previous_value() {
    let value = Atomic::<u32>::new(0b1100);

    assert_eq!(value.fetch_add(3), 0b1100);
    assert_eq!(value.fetch_sub(3), 0b1111);
    assert_eq!(value.fetch_and(0b0100), 0b1100);
    assert_eq!(value.fetch_or(0b0011), 0b0100);
    assert_eq!(value.fetch_xor(0b0001), 0b0111);
    assert_eq!(value.load(), 0b0110);
}

#[test]
fn increments_and_decrements() {
    let value = AtomicI32::new(5);

    assert_eq!(value.post_increment(), 5);
    assert_eq!(value.increment(), 7);
    assert_eq!(value.post_decrement(), 7);
    assert_eq!(value.decrement(), 5);
}

#[test]
fn compound_assignment_returns_new_value() {
    let value = Atomic::<u32>::new(10);

    assert_eq!(value.add_fetch(5), 15);
    assert_eq!(value.sub_fetch(3), 12);
    assert_eq!(value.and_fetch(0b1010), 0b1000);
    assert_eq!(value.or_fetch(0b0011), 0b1011);
    assert_eq!(value.xor_fetch(0b1111), 0b0100);
    assert_eq!(value.load(), 0b0100);

    let small = Atomic::<u8>::new(250);
    assert_eq!(small.add_fetch(10), 4);
    assert_eq!(small.sub_fetch(5), 255);
}

#[test]
fn arithmetic_wraps() {
    let value = Atomic::<u8>::new(u8::MAX);
    assert_eq!(value.increment(), 0);
    assert_eq!(value.decrement(), u8::MAX);
}

#[test]
fn swap_and_compare_exchange() {
    let value = Atomic::<usize>::new(1);
    assert_eq!(value.swap(2), 1);
    assert_eq!(value.compare_exchange(1, 9), Err(2));
    assert_eq!(value.compare_exchange(2, 9), Ok(2));
    assert_eq!(value.load(), 9);
}

#[test]
fn atomic_bool_behaves_like_a_flag() {
    let flag = AtomicBool::new(false);
    assert!(!flag.fetch_or(true));
    assert!(flag.load());
    assert!(flag.fetch_and(false));
    assert!(!flag.swap(true));
    assert!(flag.fetch_xor(true));
    assert!(!flag.load());
}

#[test]
fn concurrent_deltas_are_never_lost() {
    let value = Arc::new(Atomic::<i64>::new(0));

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let value = Arc::clone(&value);
            thread::spawn(move || {
                for _ in 0..5_000 {
                    if worker % 2 == 0 {
                        value.fetch_add(3);
                    } else {
                        value.fetch_sub(1);
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(value.load(), 4 * 5_000 * 3 - 4 * 5_000);
}

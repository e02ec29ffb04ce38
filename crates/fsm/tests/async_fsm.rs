use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use embra_fsm::{AsyncFsm, FsmConfig, FsmStatus, Signal, State, StateId, Symbol};

const FLIP: Symbol = Symbol(1);
const DONE: Symbol = Symbol(2);
const LEFT: Symbol = Symbol(3);
const RIGHT: Symbol = Symbol(4);

/// States entered by `transition_from_irq_is_handled_first`.
static ENTERED: Lazy<Mutex<Vec<&'static str>>> = Lazy::new(|| Mutex::new(Vec::new()));
static GATE_OPEN: AtomicBool = AtomicBool::new(false);

fn entered() -> Vec<&'static str> {
    ENTERED.lock().unwrap().clone()
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// a <-> b on FLIP, b -> done on DONE.
fn machine(config: FsmConfig) -> (AsyncFsm, StateId, StateId) {
    let fsm = AsyncFsm::new(config);
    let a = fsm.add_state(State::new()).unwrap();
    let b = fsm.add_state(State::new()).unwrap();
    let done = fsm.add_state(State::new()).unwrap();

    fsm.add_transition(a, FLIP, b).unwrap();
    fsm.add_transition(b, FLIP, a).unwrap();
    fsm.add_transition(b, DONE, done).unwrap();
    fsm.add_stop_state(done).unwrap();
    fsm.set_start_state(a).unwrap();
    (fsm, b, done)
}

#[test]
fn irq_burst_is_processed_completely() {
    let (mut fsm, _, _) = machine(FsmConfig::new("burst").silent(true));
    fsm.start().unwrap();
    let fsm = Arc::new(fsm);

    let irq = {
        let fsm = Arc::clone(&fsm);
        thread::spawn(move || {
            for _ in 0..100 {
                assert!(fsm.raise_from_irq(FLIP, Signal::empty()));
            }
        })
    };
    irq.join().unwrap();

    assert!(wait_until(|| fsm.processed() == 100));
    assert_eq!(fsm.pending(), 0);
}

#[test]
fn worker_wakes_on_raise_and_stops_in_a_stop_state() {
    let (mut fsm, b, done) = machine(FsmConfig::new("wake"));
    fsm.start().unwrap();
    assert!(fsm.worker_running());

    assert!(fsm.raise(FLIP, Signal::empty()));
    assert!(wait_until(|| fsm.current() == Some(b)));

    assert!(fsm.raise(DONE, Signal::empty()));
    assert!(fsm.stop());
    assert_eq!(fsm.current(), Some(done));
    assert_eq!(fsm.status(), FsmStatus::Stopped);
    assert!(!fsm.worker_running());
}

#[test]
fn stop_outside_a_stop_state_halts_after_retries() {
    let config = FsmConfig::new("stuck")
        .silent(true)
        .stop_retries(2)
        .stop_timeout(Duration::from_millis(10));
    let (mut fsm, _, _) = machine(config);
    fsm.start().unwrap();

    assert!(!fsm.stop());
    assert_eq!(fsm.status(), FsmStatus::Stopped);
    assert!(!fsm.worker_running());
}

#[test]
fn actions_run_on_the_worker() {
    let entered = Arc::new(AtomicUsize::new(0));
    let mut fsm = AsyncFsm::named("actions");
    let idle = fsm.add_state(State::new()).unwrap();

    let counter = Arc::clone(&entered);
    let busy = fsm
        .add_state(State::new().with_action(move |ctx, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            // Return to idle straight away.
            ctx.transition(FLIP, Signal::empty());
            true
        }))
        .unwrap();

    fsm.add_transition(idle, FLIP, busy).unwrap();
    fsm.add_transition(busy, FLIP, idle).unwrap();
    fsm.set_start_state(idle).unwrap();
    fsm.start().unwrap();

    for _ in 0..5 {
        assert!(wait_until(|| fsm.current() == Some(idle) && fsm.pending() == 0));
        assert!(fsm.raise(FLIP, Signal::empty()));
    }

    assert!(wait_until(|| entered.load(Ordering::SeqCst) == 5));
    assert!(wait_until(|| fsm.processed() == 10));
    fsm.halt();
    assert!(!fsm.worker_running());
}

#[test]
fn restart_after_halt() {
    let (mut fsm, b, _) = machine(FsmConfig::new("restart"));
    fsm.start().unwrap();
    fsm.halt();
    assert!(!fsm.running());

    fsm.start().unwrap();
    assert!(fsm.raise(FLIP, Signal::empty()));
    assert!(wait_until(|| fsm.current() == Some(b)));
}

#[test]
fn transition_from_irq_is_handled_first() {
    let mut fsm = AsyncFsm::named("irq-order");
    let idle = fsm.add_state(State::new()).unwrap();
    let gate = fsm
        .add_state(State::new().with_action(|_, _| {
            ENTERED.lock().unwrap().push("gate");
            while !GATE_OPEN.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            true
        }))
        .unwrap();
    let left = fsm
        .add_state(State::new().with_action(|_, _| {
            ENTERED.lock().unwrap().push("left");
            true
        }))
        .unwrap();
    let right = fsm
        .add_state(State::new().with_action(|_, _| {
            ENTERED.lock().unwrap().push("right");
            true
        }))
        .unwrap();

    fsm.add_transition(idle, FLIP, gate).unwrap();
    fsm.add_transition(gate, LEFT, left).unwrap();
    fsm.add_transition(gate, RIGHT, right).unwrap();
    fsm.add_transition(left, RIGHT, right).unwrap();
    fsm.add_transition(right, LEFT, left).unwrap();
    fsm.set_start_state(idle).unwrap();
    fsm.start().unwrap();

    // Hold the worker inside the gate action while both events queue up.
    assert!(fsm.raise(FLIP, Signal::empty()));
    assert!(wait_until(|| entered() == ["gate"]));
    assert!(fsm.raise(LEFT, Signal::empty()));
    assert!(fsm.transition_from_irq(RIGHT, Signal::empty()));
    GATE_OPEN.store(true, Ordering::SeqCst);

    assert!(wait_until(|| fsm.processed() == 3));
    assert_eq!(entered(), ["gate", "right", "left"]);
    assert_eq!(fsm.current(), Some(left));

    fsm.halt();
    assert!(!fsm.transition_from_irq(RIGHT, Signal::empty()));
    assert!(!fsm.raise_from_irq(RIGHT, Signal::empty()));
}

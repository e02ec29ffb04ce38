use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use embra_kernel::SingleThreading;

use super::{go, is_ok};
use crate::base::{FsmConfig, FsmStatus};
use crate::fsm::Fsm;
use crate::signal::{Signal, Symbol};
use crate::state::{State, StateId};

const GO: Symbol = Symbol(1);
const BACK: Symbol = Symbol(2);

type Machine = Fsm<SingleThreading>;

fn machine() -> Machine {
    Machine::new(FsmConfig::new("test").silent(true).stop_retries(1))
}

/// A --go [ok]--> B, B --back--> A.
fn guarded() -> (Machine, StateId, StateId) {
    let fsm = machine();
    let a = fsm.add_state(State::new()).unwrap();
    let b = fsm.add_state(State::new()).unwrap();

    fsm.add_guarded_transition(a, GO, b, is_ok).unwrap();
    fsm.add_transition(b, BACK, a).unwrap();
    fsm.set_start_state(a).unwrap();
    fsm.start().unwrap();
    (fsm, a, b)
}

#[test]
fn guard_decides_whether_the_state_changes() {
    let (fsm, a, b) = guarded();

    assert_eq!(fsm.transition(GO, go(false)), FsmStatus::StateUnchanged);
    assert_eq!(fsm.current(), Some(a));

    assert_eq!(fsm.transition(GO, go(true)), FsmStatus::StateChanged);
    assert_eq!(fsm.current(), Some(b));
}

#[test]
fn raised_events_go_through_the_same_guard() {
    let (fsm, a, b) = guarded();

    assert!(fsm.raise(GO, go(false)));
    assert_eq!(fsm.run(), FsmStatus::StateUnchanged);
    assert_eq!(fsm.current(), Some(a));

    assert!(fsm.raise(GO, go(true)));
    assert_eq!(fsm.run(), FsmStatus::StateChanged);
    assert_eq!(fsm.current(), Some(b));
    assert_eq!(fsm.processed(), 2);
}

#[test]
fn unmatched_symbol_leaves_state_unchanged() {
    let (fsm, a, _) = guarded();

    assert_eq!(fsm.transition(BACK, Signal::empty()), FsmStatus::StateUnchanged);
    assert_eq!(fsm.current(), Some(a));
    assert!(!fsm.accept(BACK));
    assert!(!fsm.raise(BACK, Signal::empty()));
    assert_eq!(fsm.pending(), 0);
}

#[test]
fn rejected_guard_falls_through_to_the_next_candidate() {
    let fsm = machine();
    let a = fsm.add_state(State::new()).unwrap();
    let b = fsm.add_state(State::new()).unwrap();
    let c = fsm.add_state(State::new()).unwrap();

    fsm.add_guarded_transition(a, GO, b, is_ok).unwrap();
    fsm.add_transition(a, GO, c).unwrap();
    fsm.set_start_state(a).unwrap();
    fsm.start().unwrap();

    assert_eq!(fsm.transition(GO, go(false)), FsmStatus::StateChanged);
    assert_eq!(fsm.current(), Some(c));
}

#[test]
fn parent_transitions_apply_to_children() {
    let fsm = machine();
    let idle = fsm.add_state(State::new()).unwrap();
    let online = fsm.add_state(State::new()).unwrap();
    let connected = fsm.add_state(State::with_parent(online)).unwrap();

    fsm.add_transition(idle, GO, connected).unwrap();
    fsm.add_transition(online, BACK, idle).unwrap();
    fsm.set_start_state(idle).unwrap();
    fsm.start().unwrap();

    assert_eq!(fsm.transition(GO, Signal::empty()), FsmStatus::StateChanged);
    assert!(fsm.accept(BACK));
    assert_eq!(fsm.transition(BACK, Signal::empty()), FsmStatus::StateChanged);
    assert_eq!(fsm.current(), Some(idle));
}

#[test]
fn action_runs_on_entry_with_the_signal() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let fsm = machine();
    let a = fsm.add_state(State::new()).unwrap();

    let log = Arc::clone(&seen);
    let b = fsm
        .add_state(State::new().with_action(move |ctx, signal| {
            log.lock().unwrap().push((ctx.state(), is_ok(signal)));
            true
        }))
        .unwrap();

    fsm.add_transition(a, GO, b).unwrap();
    fsm.set_start_state(a).unwrap();
    fsm.start().unwrap();

    assert_eq!(fsm.transition(GO, go(true)), FsmStatus::StateChanged);
    assert_eq!(*seen.lock().unwrap(), [(b, true)]);
}

#[test]
fn failing_action_moves_to_the_error_state() {
    let recovered = Arc::new(AtomicUsize::new(0));
    let fsm = machine();
    let a = fsm.add_state(State::new()).unwrap();
    let broken = fsm.add_state(State::new().with_action(|_, _| false)).unwrap();

    let counter = Arc::clone(&recovered);
    let error = fsm
        .add_state(State::new().with_action(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        }))
        .unwrap();

    fsm.add_transition(a, GO, broken).unwrap();
    fsm.set_error_state(error).unwrap();
    fsm.set_start_state(a).unwrap();
    fsm.start().unwrap();

    assert_eq!(fsm.transition(GO, Signal::empty()), FsmStatus::Fault);
    assert_eq!(fsm.current(), Some(error));
    assert_eq!(fsm.status(), FsmStatus::Error);
    assert!(!fsm.running());
    assert_eq!(recovered.load(Ordering::SeqCst), 1);

    assert!(!fsm.raise(GO, Signal::empty()));
    assert_eq!(fsm.transition(GO, Signal::empty()), FsmStatus::Error);
}

#[test]
fn stop_waits_for_a_stop_state() {
    let fsm = machine();
    let a = fsm.add_state(State::new()).unwrap();
    let done = fsm.add_state(State::new()).unwrap();

    fsm.add_transition(a, GO, done).unwrap();
    fsm.add_stop_state(done).unwrap();
    fsm.set_start_state(a).unwrap();
    fsm.start().unwrap();

    assert!(!fsm.stop());
    assert!(fsm.running());

    fsm.transition(GO, Signal::empty());
    assert!(fsm.stop());
    assert_eq!(fsm.status(), FsmStatus::Stopped);
    assert!(fsm.stop());
}

#[test]
fn machine_without_stop_states_stops_at_once() {
    let (fsm, _, _) = guarded();

    assert!(fsm.stop());
    assert_eq!(fsm.status(), FsmStatus::Stopped);
    assert!(!fsm.raise(GO, go(true)));
}

#[test]
fn halt_stops_anywhere() {
    let (fsm, a, _) = guarded();

    fsm.halt();
    assert_eq!(fsm.status(), FsmStatus::Stopped);
    assert_eq!(fsm.current(), Some(a));
    assert_eq!(fsm.transition(GO, go(true)), FsmStatus::Stopped);

    fsm.start().unwrap();
    assert!(fsm.running());
}

#[test]
fn action_requests_are_queued_around_pending_events() {
    const NEXT: Symbol = Symbol(3);
    const LATER: Symbol = Symbol(4);

    let fsm = machine();
    let a = fsm.add_state(State::new()).unwrap();
    let b = fsm
        .add_state(State::new().with_action(|ctx, _| {
            ctx.raise(LATER, Signal::empty());
            ctx.transition(NEXT, Signal::empty());
            true
        }))
        .unwrap();
    let c = fsm.add_state(State::new()).unwrap();
    let d = fsm.add_state(State::new()).unwrap();

    fsm.add_transition(a, GO, b).unwrap();
    fsm.add_transition(b, NEXT, c).unwrap();
    fsm.add_transition(c, BACK, d).unwrap();
    fsm.add_transition(d, LATER, a).unwrap();
    fsm.set_start_state(a).unwrap();
    fsm.start().unwrap();
    fsm.block(false);

    assert!(fsm.raise(GO, Signal::empty()));
    assert!(fsm.raise_from_irq(BACK, Signal::empty()));
    assert_eq!(fsm.run(), FsmStatus::StateChanged);
    assert_eq!(fsm.current(), Some(b));

    // NEXT jumps ahead of BACK, LATER waits behind it.
    assert_eq!(fsm.pending(), 3);

    assert_eq!(fsm.run(), FsmStatus::StateChanged);
    assert_eq!(fsm.current(), Some(c));
    assert_eq!(fsm.run(), FsmStatus::StateChanged);
    assert_eq!(fsm.current(), Some(d));
    assert_eq!(fsm.run(), FsmStatus::StateChanged);
    assert_eq!(fsm.current(), Some(a));
    assert_eq!(fsm.pending(), 0);
}

#[test]
fn transition_from_irq_jumps_ahead_of_raised_events() {
    let fsm = machine();
    let a = fsm.add_state(State::new()).unwrap();
    let b = fsm.add_state(State::new()).unwrap();
    let c = fsm.add_state(State::new()).unwrap();

    fsm.add_transition(a, GO, b).unwrap();
    fsm.add_transition(a, BACK, c).unwrap();
    fsm.set_start_state(a).unwrap();
    fsm.start().unwrap();

    assert!(fsm.raise(GO, Signal::empty()));
    assert!(fsm.transition_from_irq(BACK, Signal::empty()));
    assert_eq!(fsm.pending(), 2);

    assert_eq!(fsm.run(), FsmStatus::StateChanged);
    assert_eq!(fsm.current(), Some(c));
    assert_eq!(fsm.run(), FsmStatus::StateUnchanged);
    assert_eq!(fsm.current(), Some(c));
}

#[test]
fn interrupt_variants_refuse_a_stopped_machine() {
    let (fsm, a, _) = guarded();
    fsm.halt();

    assert!(!fsm.transition_from_irq(GO, go(true)));
    assert!(!fsm.raise_from_irq(GO, go(true)));
    assert_eq!(fsm.pending(), 0);
    assert_eq!(fsm.current(), Some(a));
}

use embra_kernel::SingleThreading;

use crate::base::{FsmBase, FsmConfig, FsmStatus};
use crate::error::FsmError;
use crate::signal::Symbol;
use crate::state::{State, Transition};

type Base = FsmBase<SingleThreading>;

fn base() -> Base {
    Base::new(FsmConfig::new("table").silent(true))
}

#[test]
fn adding_a_state_twice_is_rejected() {
    let fsm = base();
    let state = State::new();
    let copy = state.clone();

    let id = fsm.add_state(state).unwrap();
    assert!(matches!(fsm.add_state(copy), Err(FsmError::DuplicateState(dup)) if dup == id));
    assert_eq!(fsm.state_count(), 1);
}

#[test]
fn transitions_must_connect_known_states() {
    let fsm = base();
    let known = fsm.add_state(State::new()).unwrap();
    let stranger = State::new().id();

    assert!(matches!(
        fsm.add_transition(known, Symbol(1), stranger),
        Err(FsmError::UnknownState(id)) if id == stranger
    ));
    assert!(matches!(
        fsm.add_transition(stranger, Symbol(1), known),
        Err(FsmError::UnknownState(id)) if id == stranger
    ));
    assert!(matches!(fsm.set_start_state(stranger), Err(FsmError::UnknownState(_))));
    assert!(matches!(fsm.add_state(State::with_parent(stranger)), Err(FsmError::UnknownState(_))));
}

#[test]
fn alphabet_collects_transition_symbols() {
    let fsm = base();
    let a = fsm.add_state(State::new()).unwrap();

    let mut b = State::new();
    b.add_transition(Transition::new(Symbol(7), a));
    let b = fsm.add_state(b).unwrap();

    fsm.add_transition(a, Symbol(3), b).unwrap();
    assert!(fsm.add_alphabet_symbol(Symbol(9)));
    assert!(!fsm.add_alphabet_symbol(Symbol(3)));

    assert_eq!(fsm.alphabet(), [Symbol(3), Symbol(7), Symbol(9)]);
}

#[test]
fn inherited_symbols_count_towards_determinism() {
    let fsm = base();
    let parent = fsm.add_state(State::new()).unwrap();
    let child = fsm.add_state(State::with_parent(parent)).unwrap();
    let other = fsm.add_state(State::new()).unwrap();

    fsm.add_transition(parent, Symbol(1), other).unwrap();
    fsm.add_transition(child, Symbol(2), other).unwrap();
    assert!(fsm.deterministic());

    fsm.add_transition(child, Symbol(1), parent).unwrap();
    assert!(!fsm.deterministic());
}

#[test]
fn duplicate_guarded_transitions_are_not_deterministic() {
    let fsm = base();
    let a = fsm.add_state(State::new()).unwrap();
    let b = fsm.add_state(State::new()).unwrap();

    fsm.add_guarded_transition(a, Symbol(1), b, |_| true).unwrap();
    fsm.add_guarded_transition(a, Symbol(1), a, |_| true).unwrap();
    assert!(!fsm.deterministic());
}

#[test]
fn validity_needs_start_stop_and_error_states() {
    let fsm = base();
    assert!(!fsm.valid());

    let start = fsm.add_state(State::new()).unwrap();
    let stop = fsm.add_state(State::new()).unwrap();
    let error = fsm.add_state(State::new()).unwrap();
    fsm.add_transition(start, Symbol(1), stop).unwrap();

    fsm.set_start_state(start).unwrap();
    assert!(!fsm.valid());
    assert!(matches!(fsm.start_checked(), Err(FsmError::Invalid)));

    fsm.add_stop_state(stop).unwrap();
    fsm.set_error_state(error).unwrap();
    assert!(fsm.valid());

    fsm.start_checked().unwrap();
    assert_eq!(fsm.status(), FsmStatus::Running);
}

#[test]
fn start_requires_a_start_state() {
    let fsm = base();
    fsm.add_state(State::new()).unwrap();

    assert!(matches!(fsm.start(), Err(FsmError::NoStartState)));
    assert_eq!(fsm.status(), FsmStatus::Stopped);
    assert_eq!(fsm.current(), None);
}

//! States, transitions and the context handed to state actions.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::Cell;
use core::fmt;

use critical_section::Mutex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::signal::{Signal, Symbol};

/// Opaque state identifier, unique for the lifetime of the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StateId(u32);

static NEXT_ID: Mutex<Cell<u32>> = Mutex::new(Cell::new(1));

impl StateId {
    fn next() -> Self {
        critical_section::with(|cs| {
            let cell = NEXT_ID.borrow(cs);
            let id = cell.get();
            cell.set(id.wrapping_add(1));
            Self(id)
        })
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Predicate deciding whether a transition accepts a signal.
pub type Guard = Arc<dyn Fn(&Signal) -> bool + Send + Sync>;

/// Entry action of a state. Returning `false` reports a failure.
pub type Action = Arc<dyn Fn(&mut StateContext, &Signal) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Transition {
    symbol: Symbol,
    next: StateId,
    guard: Option<Guard>,
}

impl Transition {
    pub fn new(symbol: Symbol, next: StateId) -> Self {
        Self {
            symbol,
            next,
            guard: None,
        }
    }

    pub fn guarded<G>(symbol: Symbol, next: StateId, guard: G) -> Self
    where
        G: Fn(&Signal) -> bool + Send + Sync + 'static,
    {
        Self {
            symbol,
            next,
            guard: Some(Arc::new(guard)),
        }
    }

    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    pub fn next(&self) -> StateId {
        self.next
    }

    pub fn is_guarded(&self) -> bool {
        self.guard.is_some()
    }

    /// True if the transition has no guard or the guard accepts `signal`.
    pub fn admits(&self, signal: &Signal) -> bool {
        self.guard.as_ref().map_or(true, |guard| guard(signal))
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("symbol", &self.symbol)
            .field("next", &self.next)
            .field("guarded", &self.is_guarded())
            .finish()
    }
}

/// A node of the transition table.
#[derive(Clone)]
pub struct State {
    id: StateId,
    parent: Option<StateId>,
    action: Option<Action>,
    transitions: Vec<Transition>,
}

impl State {
    pub fn new() -> Self {
        Self {
            id: StateId::next(),
            parent: None,
            action: None,
            transitions: Vec::new(),
        }
    }

    /// Creates a child of `parent`. Symbols the child does not handle are
    /// looked up in the parent.
    pub fn with_parent(parent: StateId) -> Self {
        let mut state = Self::new();
        state.parent = Some(parent);
        state
    }

    pub fn with_action<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut StateContext, &Signal) -> bool + Send + Sync + 'static,
    {
        self.set_action(action);
        self
    }

    pub fn set_action<F>(&mut self, action: F)
    where
        F: Fn(&mut StateContext, &Signal) -> bool + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(action));
    }

    pub fn set_parent(&mut self, parent: Option<StateId>) {
        self.parent = parent;
    }

    pub fn add_transition(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn parent(&self) -> Option<StateId> {
        self.parent
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub(crate) fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("action", &self.has_action())
            .field("transitions", &self.transitions)
            .finish()
    }
}

/// Handle passed to a state action while it runs.
///
/// Requests made here are applied once the action returns: raised events
/// join the back of the pending queue, requested transitions jump to its
/// front in the order they were made.
#[derive(Debug)]
pub struct StateContext {
    state: StateId,
    pub(crate) front: Vec<(Symbol, Signal)>,
    pub(crate) back: Vec<(Symbol, Signal)>,
}

impl StateContext {
    pub(crate) fn new(state: StateId) -> Self {
        Self {
            state,
            front: Vec::new(),
            back: Vec::new(),
        }
    }

    /// State whose action is running.
    pub fn state(&self) -> StateId {
        self.state
    }

    pub fn raise(&mut self, symbol: impl Into<Symbol>, signal: Signal) {
        self.back.push((symbol.into(), signal));
    }

    pub fn transition(&mut self, symbol: impl Into<Symbol>, signal: Signal) {
        self.front.push((symbol.into(), signal));
    }
}

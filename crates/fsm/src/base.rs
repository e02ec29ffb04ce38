//! Transition table, pending-event queue and the single cycle step shared by
//! the synchronous and autonomous machines.
//!
//! The table lives behind the policy lock. The runtime state (current
//! state, status and pending events) lives in a critical section so events
//! can be raised from interrupt context. The table lock is never taken while
//! the runtime critical section is held.

use alloc::collections::{BTreeMap, BTreeSet, VecDeque};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::time::Duration;

use critical_section::Mutex;
use log::{debug, error, trace, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use embra_kernel::{AtomicBool, DefaultThreading, LockCell, RawEvent, Threading, Timeout};

use crate::error::FsmError;
use crate::signal::{Signal, Symbol};
use crate::state::{State, StateContext, StateId, Transition};

/// Outcome of a transition step and lifecycle status of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FsmStatus {
    StateUnchanged,
    StateChanged,
    /// The entered state's action failed.
    Fault,
    /// The machine sits in its error state.
    Error,
    Stopped,
    Running,
}

impl fmt::Display for FsmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::StateUnchanged => "state unchanged",
            Self::StateChanged => "state changed",
            Self::Fault => "fault",
            Self::Error => "error",
            Self::Stopped => "stopped",
            Self::Running => "running",
        };
        f.write_str(text)
    }
}

pub const DEFAULT_STOP_RETRIES: u8 = 3;
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FsmConfig {
    pub name: String,
    /// Suppresses warnings and error logs from the machine.
    pub silent: bool,
    /// Number of times `stop` waits for the machine to reach a stop state.
    pub stop_retries: u8,
    pub stop_timeout: Duration,
}

impl FsmConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn stop_retries(mut self, retries: u8) -> Self {
        self.stop_retries = retries;
        self
    }

    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }
}

impl Default for FsmConfig {
    fn default() -> Self {
        Self {
            name: String::from("fsm"),
            silent: false,
            stop_retries: DEFAULT_STOP_RETRIES,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

#[derive(Default)]
struct Table {
    states: BTreeMap<StateId, Arc<State>>,
    start: Option<StateId>,
    stops: BTreeSet<StateId>,
    error: Option<StateId>,
    alphabet: BTreeSet<Symbol>,
}

impl Table {
    fn require(&self, id: StateId) -> Result<(), FsmError> {
        if self.states.contains_key(&id) {
            Ok(())
        } else {
            Err(FsmError::UnknownState(id))
        }
    }

    /// Walks `id` and its ancestors, bounded by the table size so a parent
    /// cycle cannot hang the caller.
    fn lineage(&self, id: StateId) -> impl Iterator<Item = &Arc<State>> + '_ {
        let mut next = Some(id);
        (0..self.states.len()).map_while(move |_| {
            let state = self.states.get(&next?)?;
            next = state.parent();
            Some(state)
        })
    }

    fn candidates(&self, id: StateId, symbol: Symbol) -> Vec<Transition> {
        self.lineage(id)
            .flat_map(|state| state.transitions().iter())
            .filter(|transition| transition.symbol() == symbol)
            .cloned()
            .collect()
    }

    fn accepts(&self, id: StateId, symbol: Symbol) -> bool {
        self.lineage(id)
            .flat_map(|state| state.transitions().iter())
            .any(|transition| transition.symbol() == symbol)
    }

    fn deterministic(&self) -> bool {
        self.states.keys().all(|&id| {
            let mut seen = BTreeSet::new();
            self.lineage(id)
                .flat_map(|state| state.transitions().iter())
                .all(|transition| seen.insert(transition.symbol()))
        })
    }

    fn is_stop(&self, id: StateId) -> bool {
        self.stops.contains(&id) || self.error == Some(id)
    }
}

struct Runtime {
    pending: VecDeque<(Symbol, Signal)>,
    current: Option<StateId>,
    status: FsmStatus,
    processed: usize,
    blocking: bool,
}

/// Clears the cycle flag even if an action panics.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false);
    }
}

/// Shared state machine engine.
///
/// Build the table with [`add_state`](Self::add_state) and friends, then
/// [`start`](Self::start) it and feed it symbols. [`cycle`](Self::cycle)
/// consumes one pending event.
pub struct FsmBase<P: Threading = DefaultThreading> {
    config: FsmConfig,
    table: LockCell<P::Lock, Table>,
    runtime: Mutex<RefCell<Runtime>>,
    stop_event: P::Event,
    in_cycle: AtomicBool,
}

impl<P: Threading> FsmBase<P> {
    pub fn new(config: FsmConfig) -> Self {
        Self {
            config,
            table: LockCell::default(),
            runtime: Mutex::new(RefCell::new(Runtime {
                pending: VecDeque::new(),
                current: None,
                status: FsmStatus::Stopped,
                processed: 0,
                blocking: false,
            })),
            stop_event: P::Event::default(),
            in_cycle: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &FsmConfig {
        &self.config
    }

    fn with_runtime<R>(&self, f: impl FnOnce(&mut Runtime) -> R) -> R {
        critical_section::with(|cs| f(&mut self.runtime.borrow_ref_mut(cs)))
    }

    // ---- table -------------------------------------------------------

    /// Adds `state`; the symbols of its transitions join the alphabet.
    pub fn add_state(&self, state: State) -> Result<StateId, FsmError> {
        let id = state.id();
        self.table.with(|table| {
            if table.states.contains_key(&id) {
                return Err(FsmError::DuplicateState(id));
            }
            if let Some(parent) = state.parent() {
                table.require(parent)?;
            }

            table
                .alphabet
                .extend(state.transitions().iter().map(Transition::symbol));
            table.states.insert(id, Arc::new(state));
            Ok(())
        })?;

        debug!("fsm `{}`: added state {}", self.config.name, id);
        Ok(id)
    }

    pub fn add_states<I: IntoIterator<Item = State>>(&self, states: I) -> Result<Vec<StateId>, FsmError> {
        states.into_iter().map(|state| self.add_state(state)).collect()
    }

    pub fn add_transition(&self, from: StateId, symbol: impl Into<Symbol>, to: StateId) -> Result<(), FsmError> {
        self.insert_transition(from, Transition::new(symbol.into(), to))
    }

    pub fn add_guarded_transition<G>(
        &self,
        from: StateId,
        symbol: impl Into<Symbol>,
        to: StateId,
        guard: G,
    ) -> Result<(), FsmError>
    where
        G: Fn(&Signal) -> bool + Send + Sync + 'static,
    {
        self.insert_transition(from, Transition::guarded(symbol.into(), to, guard))
    }

    fn insert_transition(&self, from: StateId, transition: Transition) -> Result<(), FsmError> {
        self.table.with(|table| {
            table.require(transition.next())?;
            let state = table.states.get_mut(&from).ok_or(FsmError::UnknownState(from))?;

            table.alphabet.insert(transition.symbol());
            Arc::make_mut(state).add_transition(transition);
            Ok(())
        })
    }

    pub fn set_start_state(&self, id: StateId) -> Result<(), FsmError> {
        self.table.with(|table| {
            table.require(id)?;
            table.start = Some(id);
            Ok(())
        })
    }

    pub fn add_stop_state(&self, id: StateId) -> Result<(), FsmError> {
        self.table.with(|table| {
            table.require(id)?;
            table.stops.insert(id);
            Ok(())
        })
    }

    pub fn add_stop_states<I: IntoIterator<Item = StateId>>(&self, ids: I) -> Result<(), FsmError> {
        ids.into_iter().try_for_each(|id| self.add_stop_state(id))
    }

    pub fn set_error_state(&self, id: StateId) -> Result<(), FsmError> {
        self.table.with(|table| {
            table.require(id)?;
            table.error = Some(id);
            Ok(())
        })
    }

    /// Adds `symbol` to the alphabet. Returns false if it was already there.
    pub fn add_alphabet_symbol(&self, symbol: impl Into<Symbol>) -> bool {
        let symbol = symbol.into();
        self.table.with(|table| table.alphabet.insert(symbol))
    }

    pub fn alphabet(&self) -> Vec<Symbol> {
        self.table.with(|table| table.alphabet.iter().copied().collect())
    }

    pub fn state_count(&self) -> usize {
        self.table.with(|table| table.states.len())
    }

    pub fn contains_state(&self, id: StateId) -> bool {
        self.table.with(|table| table.states.contains_key(&id))
    }

    /// True if no state, counting the transitions it inherits, has two
    /// transitions for the same symbol.
    pub fn deterministic(&self) -> bool {
        self.table.with(|table| table.deterministic())
    }

    /// True if the machine has states, a start, stop and error state, and is
    /// deterministic.
    pub fn valid(&self) -> bool {
        let status = self.status();
        if status != FsmStatus::Running && status != FsmStatus::Stopped {
            return false;
        }

        self.table.with(|table| {
            !table.states.is_empty()
                && table.start.is_some()
                && !table.stops.is_empty()
                && table.error.is_some()
                && table.deterministic()
        })
    }

    // ---- lifecycle ---------------------------------------------------

    /// Moves to the start state and begins accepting events.
    ///
    /// Events left over from a previous run are discarded.
    pub fn start(&self) -> Result<(), FsmError> {
        let start = self.table.with(|table| table.start).ok_or(FsmError::NoStartState)?;

        self.with_runtime(|rt| {
            rt.pending.clear();
            rt.current = Some(start);
            rt.status = FsmStatus::Running;
        });

        debug!("fsm `{}` started in {}", self.config.name, start);
        Ok(())
    }

    /// Like [`start`](Self::start) but refuses machines that are not
    /// [`valid`](Self::valid).
    pub fn start_checked(&self) -> Result<(), FsmError> {
        if !self.valid() {
            return Err(FsmError::Invalid);
        }
        self.start()
    }

    /// Stops the machine once it rests in a stop or error state.
    ///
    /// A transition may be in flight when the request arrives, so the check
    /// is repeated up to `stop_retries` times, each time waiting for the
    /// machine to report that it reached a stop state. A machine without stop
    /// states stops immediately.
    pub fn stop(&self) -> bool {
        for attempt in 0..=self.config.stop_retries {
            let (status, current) = self.with_runtime(|rt| (rt.status, rt.current));
            if status != FsmStatus::Running {
                return true;
            }

            let at_rest = self.table.with(|table| {
                table.stops.is_empty() || current.map_or(false, |id| table.is_stop(id))
            });

            if at_rest {
                self.with_runtime(|rt| rt.status = FsmStatus::Stopped);
                debug!("fsm `{}` stopped", self.config.name);
                return true;
            }

            if attempt < self.config.stop_retries {
                self.stop_event.wait(Timeout::from(self.config.stop_timeout));
            }
        }

        if !self.config.silent {
            warn!("fsm `{}` did not reach a stop state", self.config.name);
        }
        false
    }

    /// Stops the machine wherever it is.
    pub fn halt(&self) {
        let halted = self.with_runtime(|rt| {
            let running = rt.status == FsmStatus::Running;
            if running {
                rt.status = FsmStatus::Stopped;
            }
            running
        });

        if halted {
            self.stop_event.signal();
            debug!("fsm `{}` halted", self.config.name);
        }
    }

    pub fn status(&self) -> FsmStatus {
        self.with_runtime(|rt| rt.status)
    }

    pub fn running(&self) -> bool {
        self.status() == FsmStatus::Running
    }

    pub fn current(&self) -> Option<StateId> {
        self.with_runtime(|rt| rt.current)
    }

    /// Number of events consumed by [`cycle`](Self::cycle).
    pub fn processed(&self) -> usize {
        self.with_runtime(|rt| rt.processed)
    }

    pub fn pending(&self) -> usize {
        self.with_runtime(|rt| rt.pending.len())
    }

    /// Selects whether `run` drains the pending queue (true) or handles a
    /// single event per call (false).
    pub fn block(&self, blocking: bool) {
        self.with_runtime(|rt| rt.blocking = blocking);
    }

    pub fn blocking(&self) -> bool {
        self.with_runtime(|rt| rt.blocking)
    }

    // ---- events ------------------------------------------------------

    /// True if the machine runs and its current state, or one of its
    /// ancestors, has a transition for `symbol`.
    pub fn accept(&self, symbol: impl Into<Symbol>) -> bool {
        let symbol = symbol.into();
        let Some(current) = self.with_runtime(|rt| (rt.status == FsmStatus::Running).then_some(rt.current).flatten())
        else {
            return false;
        };

        self.table.with(|table| table.accepts(current, symbol))
    }

    /// Queues `symbol` behind the pending events.
    ///
    /// Returns false if the machine is not running or the current state does
    /// not accept `symbol`.
    pub fn raise(&self, symbol: impl Into<Symbol>, signal: Signal) -> bool {
        let symbol = symbol.into();
        if !self.accept(symbol) {
            if !self.config.silent {
                warn!("fsm `{}`: {} not accepted", self.config.name, symbol);
            }
            return false;
        }

        self.with_runtime(|rt| rt.pending.push_back((symbol, signal)));
        trace!("fsm `{}`: raised {}", self.config.name, symbol);
        true
    }

    /// Interrupt-safe [`raise`](Self::raise).
    ///
    /// Only the critical section is taken, so the symbol is not checked
    /// against the table; unmatched symbols are dropped when processed.
    pub fn raise_from_irq(&self, symbol: impl Into<Symbol>, signal: Signal) -> bool {
        let symbol = symbol.into();
        self.with_runtime(|rt| {
            if rt.status != FsmStatus::Running {
                return false;
            }
            rt.pending.push_back((symbol, signal));
            true
        })
    }

    /// Evaluates `symbol` right away.
    ///
    /// Called while a cycle is in progress (from an action, or from another
    /// thread) the event is put at the head of the pending queue instead and
    /// `StateUnchanged` is reported.
    pub fn transition(&self, symbol: impl Into<Symbol>, signal: Signal) -> FsmStatus {
        let symbol = symbol.into();
        if !self.running() {
            return self.status();
        }

        if self.in_cycle.swap(true) {
            self.with_runtime(|rt| rt.pending.push_front((symbol, signal)));
            return FsmStatus::StateUnchanged;
        }

        let _cycle = CycleGuard(&self.in_cycle);
        self.evaluate(symbol, &signal)
    }

    /// Puts `symbol` at the head of the pending queue from interrupt context.
    pub fn transition_from_irq(&self, symbol: impl Into<Symbol>, signal: Signal) -> bool {
        let symbol = symbol.into();
        self.with_runtime(|rt| {
            if rt.status != FsmStatus::Running {
                return false;
            }
            rt.pending.push_front((symbol, signal));
            true
        })
    }

    /// Consumes the oldest pending event.
    ///
    /// Reports `StateUnchanged` when nothing is pending or another cycle is
    /// in progress, and the lifecycle status when the machine is not running.
    pub fn cycle(&self) -> FsmStatus {
        if !self.running() {
            return self.status();
        }

        if self.in_cycle.swap(true) {
            return FsmStatus::StateUnchanged;
        }
        let _cycle = CycleGuard(&self.in_cycle);

        let Some((symbol, signal)) = self.with_runtime(|rt| rt.pending.pop_front()) else {
            return FsmStatus::StateUnchanged;
        };

        let status = self.evaluate(symbol, &signal);
        self.with_runtime(|rt| rt.processed += 1);
        status
    }

    fn evaluate(&self, symbol: Symbol, signal: &Signal) -> FsmStatus {
        let Some(current) = self.current() else {
            return FsmStatus::StateUnchanged;
        };

        // Guards run outside the table lock so they may query the machine.
        let candidates = self.table.with(|table| table.candidates(current, symbol));
        let Some(next) = candidates
            .iter()
            .find(|transition| transition.admits(signal))
            .map(Transition::next)
        else {
            trace!("fsm `{}`: {} ignored in {}", self.config.name, symbol, current);
            return FsmStatus::StateUnchanged;
        };

        let (state, is_stop) = self.table.with(|table| (table.states.get(&next).cloned(), table.is_stop(next)));
        let Some(state) = state else {
            return self.fail(next, signal);
        };

        self.with_runtime(|rt| rt.current = Some(next));
        trace!("fsm `{}`: {} -> {} on {}", self.config.name, current, next, symbol);

        if !self.enter(&state, signal) {
            return self.fail(next, signal);
        }

        if is_stop {
            self.stop_event.signal();
        }
        FsmStatus::StateChanged
    }

    /// Runs the action of `state` and queues whatever it requested.
    fn enter(&self, state: &State, signal: &Signal) -> bool {
        let Some(action) = state.action() else {
            return true;
        };

        let mut context = StateContext::new(state.id());
        let succeeded = action(&mut context, signal);

        let front = context.front;
        let back = context.back;
        if !front.is_empty() || !back.is_empty() {
            self.with_runtime(|rt| {
                for event in front.into_iter().rev() {
                    rt.pending.push_front(event);
                }
                rt.pending.extend(back);
            });
        }

        succeeded
    }

    fn fail(&self, failed: StateId, signal: &Signal) -> FsmStatus {
        if !self.config.silent {
            error!("fsm `{}`: action of {} failed", self.config.name, failed);
        }

        let error = self
            .table
            .with(|table| table.error.and_then(|id| table.states.get(&id).cloned()));

        self.with_runtime(|rt| {
            if let Some(error) = &error {
                rt.current = Some(error.id());
            }
            rt.status = FsmStatus::Error;
        });

        if let Some(error) = error {
            let mut context = StateContext::new(error.id());
            if let Some(action) = error.action() {
                action(&mut context, signal);
            }
        }

        self.stop_event.signal();
        FsmStatus::Fault
    }
}

impl<P: Threading> Default for FsmBase<P> {
    fn default() -> Self {
        Self::new(FsmConfig::default())
    }
}

impl<P: Threading> fmt::Debug for FsmBase<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsmBase")
            .field("name", &self.config.name)
            .field("status", &self.status())
            .field("current", &self.current())
            .field("pending", &self.pending())
            .finish()
    }
}

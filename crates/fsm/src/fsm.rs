//! Synchronous state machine driven by its owner.

use core::fmt;
use core::ops::Deref;

use embra_kernel::{DefaultThreading, Threading};

use crate::base::{FsmBase, FsmConfig, FsmStatus};

/// A state machine that only moves when [`run`](Fsm::run) is called.
///
/// In blocking mode a call to `run` drains every pending event; otherwise it
/// handles exactly one, which suits machines polled from a main loop. The
/// table and event API of [`FsmBase`] is reachable through `Deref`.
pub struct Fsm<P: Threading = DefaultThreading> {
    base: FsmBase<P>,
}

impl<P: Threading> Fsm<P> {
    pub fn new(config: FsmConfig) -> Self {
        Self {
            base: FsmBase::new(config),
        }
    }

    pub fn named(name: &str) -> Self {
        Self::new(FsmConfig::new(name))
    }

    /// Processes pending events and returns the status of the last one.
    pub fn run(&self) -> FsmStatus {
        if !self.base.blocking() {
            return self.base.cycle();
        }

        let mut status = FsmStatus::StateUnchanged;
        while self.base.pending() > 0 && self.base.running() {
            status = self.base.cycle();
        }
        status
    }
}

impl<P: Threading> Deref for Fsm<P> {
    type Target = FsmBase<P>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<P: Threading> Default for Fsm<P> {
    fn default() -> Self {
        Self::new(FsmConfig::default())
    }
}

impl<P: Threading> fmt::Debug for Fsm<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Fsm").field(&self.base).finish()
    }
}

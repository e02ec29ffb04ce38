//! State machine driven by its own worker thread.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use embra_kernel::{Event, MultiThreading, Thread, Timeout};

use crate::base::{FsmBase, FsmConfig, FsmStatus};
use crate::error::FsmError;
use crate::signal::{Signal, Symbol};

/// Longest time the worker sleeps before re-checking the pending queue.
pub const WAKE_TIMEOUT: Timeout = Timeout::from_millis(200);

struct Shared {
    base: FsmBase<MultiThreading>,
    /// Wakes the worker when events arrive or the machine stops.
    wake: Event,
}

impl Shared {
    fn worker_loop(&self) {
        log::debug!("fsm `{}` worker running", self.base.name());

        while self.base.running() {
            self.wake
                .wait_for(|| self.base.pending() > 0 || !self.base.running(), WAKE_TIMEOUT);
            self.base.cycle();
        }

        log::debug!("fsm `{}` worker exiting ({})", self.base.name(), self.base.status());
    }
}

/// Autonomous state machine.
///
/// After [`start`](AsyncFsm::start) a worker thread consumes raised events
/// as they arrive; producers never drive the machine themselves.
pub struct AsyncFsm {
    shared: Arc<Shared>,
    worker: Thread,
}

impl AsyncFsm {
    pub fn new(config: FsmConfig) -> Self {
        let worker = Thread::new(format!("fsm-{}", config.name));
        Self {
            shared: Arc::new(Shared {
                base: FsmBase::new(config),
                wake: Event::new(),
            }),
            worker,
        }
    }

    pub fn named(name: &str) -> Self {
        Self::new(FsmConfig::new(name))
    }

    /// Enters the start state and launches the worker.
    pub fn start(&mut self) -> Result<(), FsmError> {
        if self.worker.is_running() {
            self.halt();
        }

        self.shared.base.start()?;

        let shared = Arc::clone(&self.shared);
        if let Err(err) = self.worker.start(move || shared.worker_loop()) {
            self.shared.base.halt();
            return Err(err.into());
        }
        Ok(())
    }

    /// Waits for the machine to reach a stop state, then joins the worker.
    ///
    /// If no stop state is reached within the configured retries the
    /// machine is halted where it stands and false is returned.
    pub fn stop(&mut self) -> bool {
        let stopped = self.shared.base.stop();
        if !stopped {
            self.shared.base.halt();
        }

        self.shared.wake.signal();
        self.worker.join();
        stopped
    }

    /// Stops the machine immediately and joins the worker.
    pub fn halt(&mut self) {
        self.shared.base.halt();
        self.shared.wake.signal();
        self.worker.join();
    }

    pub fn raise(&self, symbol: impl Into<Symbol>, signal: Signal) -> bool {
        let raised = self.shared.base.raise(symbol, signal);
        if raised {
            self.shared.wake.signal();
        }
        raised
    }

    /// Queues `symbol` from interrupt context and wakes the worker.
    pub fn raise_from_irq(&self, symbol: impl Into<Symbol>, signal: Signal) -> bool {
        let raised = self.shared.base.raise_from_irq(symbol, signal);
        if raised {
            self.shared.wake.signal_from_irq();
        }
        raised
    }

    pub fn transition(&self, symbol: impl Into<Symbol>, signal: Signal) -> FsmStatus {
        let status = self.shared.base.transition(symbol, signal);
        self.shared.wake.signal();
        status
    }

    pub fn transition_from_irq(&self, symbol: impl Into<Symbol>, signal: Signal) -> bool {
        let queued = self.shared.base.transition_from_irq(symbol, signal);
        if queued {
            self.shared.wake.signal_from_irq();
        }
        queued
    }

    pub fn worker_running(&self) -> bool {
        self.worker.is_running()
    }
}

impl Deref for AsyncFsm {
    type Target = FsmBase<MultiThreading>;

    fn deref(&self) -> &Self::Target {
        &self.shared.base
    }
}

impl fmt::Debug for AsyncFsm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFsm")
            .field("base", &self.shared.base)
            .field("worker", &self.worker)
            .finish()
    }
}

impl Drop for AsyncFsm {
    fn drop(&mut self) {
        self.halt();
    }
}

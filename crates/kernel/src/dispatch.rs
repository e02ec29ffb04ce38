//! Work dispatch queue.
//!
//! A FIFO of retryable work items. Each item returns a [`Completion`]; an
//! item that asks to be retried goes back to the tail of the queue, behind
//! everything already waiting, so no item can starve the others.
//!
//! Under a threaded policy [`DispatchQueue::enable`] starts a worker that
//! drains the queue and parks on the queue's event while it is empty. Under
//! [`SingleThreading`](crate::policy::SingleThreading) enabling and disabling
//! do nothing and the application calls [`DispatchQueue::process`] itself.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::string::String;
use core::fmt;

use crate::atomic::AtomicBool;
use crate::error::{KernelError, KernelResult};
use crate::policy::{DefaultThreading, LockCell, RawEvent, Threading, Worker};
use crate::sync::{Arc, Mutex};
use crate::timeout::Timeout;
use crate::watchdog::{NoWatchdog, Watchdog};

/// Result of running a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Completion {
    Done,
    /// Run the item again after everything currently queued.
    Retry,
}

impl From<bool> for Completion {
    fn from(done: bool) -> Self {
        if done {
            Self::Done
        } else {
            Self::Retry
        }
    }
}

impl From<()> for Completion {
    fn from(_: ()) -> Self {
        Self::Done
    }
}

pub type WorkItem = Box<dyn FnMut() -> Completion + Send + 'static>;

pub const DEFAULT_CAPACITY: usize = 20;
pub const DEFAULT_WAIT_TIMEOUT: Timeout = Timeout::from_millis(500);

/// Pause taken by the worker after an item asked to be retried.
const RETRY_BACKOFF_MS: u32 = 1;

/// Configuration shared by dispatch, event and timed queues.
#[derive(Clone)]
pub struct QueueConfig {
    /// Name of the worker thread.
    pub name: String,
    pub capacity: usize,
    /// How long the worker sleeps on an empty queue, and how long a producer
    /// waits for room in a full one.
    pub wait_timeout: Timeout,
    pub watchdog: Arc<dyn Watchdog>,
    /// Enables the watchdog for the lifetime of the worker when set.
    pub watchdog_timeout: Option<Timeout>,
}

impl QueueConfig {
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder::default()
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: String::from("io"),
            capacity: DEFAULT_CAPACITY,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            watchdog: Arc::new(NoWatchdog),
            watchdog_timeout: None,
        }
    }
}

impl fmt::Debug for QueueConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueConfig")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("wait_timeout", &self.wait_timeout)
            .field("watchdog_timeout", &self.watchdog_timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct QueueConfigBuilder {
    config: QueueConfig,
}

impl QueueConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn wait_timeout(mut self, timeout: Timeout) -> Self {
        self.config.wait_timeout = timeout;
        self
    }

    pub fn watchdog(mut self, watchdog: Arc<dyn Watchdog>, timeout: Timeout) -> Self {
        self.config.watchdog = watchdog;
        self.config.watchdog_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> QueueConfig {
        self.config
    }
}

struct QueueShared<P: Threading> {
    config: QueueConfig,
    items: LockCell<P::Lock, VecDeque<WorkItem>>,
    /// Signalled when work arrives or the queue stops.
    not_empty: P::Event,
    /// Signalled when an item leaves the queue.
    not_full: P::Event,
    running: AtomicBool,
}

impl<P: Threading> QueueShared<P> {
    fn len(&self) -> usize {
        self.items.with(|items| items.len())
    }

    fn push(&self, item: WorkItem) -> KernelResult<()> {
        let capacity = self.config.capacity;
        let pushed = self.items.with(|items| {
            if items.len() >= capacity {
                return Some(item);
            }
            items.push_back(item);
            None
        });

        match pushed {
            None => {
                self.not_empty.signal();
                Ok(())
            }
            Some(_) => Err(KernelError::QueueFull { capacity }),
        }
    }

    fn process(&self) -> Option<Completion> {
        let mut item = self.items.with(|items| items.pop_front())?;
        self.not_full.signal();

        let outcome = item();
        if outcome == Completion::Retry {
            self.items.with(|items| items.push_back(item));
        }

        Some(outcome)
    }

    fn worker_loop(&self) {
        log::debug!("dispatch queue `{}` worker running", self.config.name);

        while self.running.load() {
            self.config.watchdog.reset();

            match self.process() {
                Some(Completion::Done) => {}
                Some(Completion::Retry) => P::Thread::pause(RETRY_BACKOFF_MS),
                None => {
                    self.not_empty.wait_for(
                        || !self.running.load() || self.len() > 0,
                        self.config.wait_timeout,
                    );
                }
            }
        }

        log::debug!("dispatch queue `{}` worker stopping", self.config.name);
    }
}

/// Retry-capable FIFO of work items.
pub struct DispatchQueue<P: Threading = DefaultThreading> {
    shared: Arc<QueueShared<P>>,
    worker: Mutex<P::Thread>,
}

impl<P: Threading> DispatchQueue<P> {
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(QueueConfig::builder().capacity(capacity).build())
    }

    pub fn with_config(config: QueueConfig) -> Self {
        let worker = P::Thread::named(&config.name);
        Self {
            shared: Arc::new(QueueShared {
                config,
                items: LockCell::new(VecDeque::new()),
                not_empty: P::Event::default(),
                not_full: P::Event::default(),
                running: AtomicBool::new(false),
            }),
            worker: Mutex::new(worker),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    pub fn capacity(&self) -> usize {
        self.shared.config.capacity
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while the worker thread is draining the queue.
    pub fn running(&self) -> bool {
        self.shared.running.load()
    }

    /// Appends `item` to the queue.
    ///
    /// If the queue is full the caller waits up to the configured wait
    /// timeout for a slot; [`KernelError::QueueFull`] is returned if none
    /// frees up.
    pub fn enqueue<F, R>(&self, item: F) -> KernelResult<()>
    where
        F: FnMut() -> R + Send + 'static,
        R: Into<Completion>,
    {
        let shared = &self.shared;
        let capacity = shared.config.capacity;
        if shared.len() >= capacity {
            let freed = shared
                .not_full
                .wait_for(|| shared.len() < capacity, shared.config.wait_timeout);
            if !freed {
                return Err(KernelError::QueueFull { capacity });
            }
        }

        shared.push(wrap(item))
    }

    /// Appends `item` without waiting. Callable from interrupt context.
    pub fn enqueue_from_irq<F, R>(&self, item: F) -> KernelResult<()>
    where
        F: FnMut() -> R + Send + 'static,
        R: Into<Completion>,
    {
        self.shared.push(wrap(item))
    }

    /// Binds `args` to `handler` and enqueues the result.
    pub fn enqueue_with<A, F, R>(&self, args: A, mut handler: F) -> KernelResult<()>
    where
        A: Send + 'static,
        F: FnMut(&mut A) -> R + Send + 'static,
        R: Into<Completion>,
    {
        let mut args = args;
        self.enqueue(move || handler(&mut args))
    }

    /// Runs the item at the head of the queue.
    ///
    /// Returns `None` if the queue was empty.
    pub fn process(&self) -> Option<Completion> {
        self.shared.process()
    }

    /// Runs every item queued at the time of the call exactly once.
    ///
    /// Items enqueued or retried meanwhile wait for the next call. Returns
    /// the number of items run.
    pub fn process_pending(&self) -> usize {
        let pending = self.len();
        let mut ran = 0;

        while ran < pending && self.process().is_some() {
            ran += 1;
        }
        ran
    }

    /// Starts the worker thread. Does nothing under a single-threaded policy
    /// or when already running.
    pub fn enable(&self) -> KernelResult<()> {
        if !P::THREADED {
            return Ok(());
        }

        let mut worker = self.worker.lock();
        if self.shared.running.swap(true) {
            return Ok(());
        }

        if let Some(timeout) = self.shared.config.watchdog_timeout {
            self.shared.config.watchdog.enable(timeout);
        }

        let shared = Arc::clone(&self.shared);
        if let Err(err) = worker.launch(move || shared.worker_loop()) {
            self.shared.running.store(false);
            return Err(err);
        }

        log::debug!("dispatch queue `{}` enabled", self.name());
        Ok(())
    }

    /// Stops the worker and waits for it to exit. Items still queued stay
    /// queued. Does nothing under a single-threaded policy.
    pub fn disable(&self) {
        if !P::THREADED {
            return;
        }

        let mut worker = self.worker.lock();
        if !self.shared.running.swap(false) {
            log::warn!("dispatch queue `{}` is already disabled", self.name());
            return;
        }

        self.shared.not_empty.signal();
        self.shared.not_full.signal();
        worker.halt();

        if self.shared.config.watchdog_timeout.is_some() {
            self.shared.config.watchdog.disable();
        }
        log::debug!("dispatch queue `{}` disabled", self.name());
    }
}

fn wrap<F, R>(mut item: F) -> WorkItem
where
    F: FnMut() -> R + Send + 'static,
    R: Into<Completion>,
{
    Box::new(move || item().into())
}

impl<P: Threading> Default for DispatchQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Threading> fmt::Debug for DispatchQueue<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("name", &self.name())
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("running", &self.running())
            .finish()
    }
}

impl<P: Threading> Drop for DispatchQueue<P> {
    fn drop(&mut self) {
        if self.running() {
            self.disable();
        }
    }
}

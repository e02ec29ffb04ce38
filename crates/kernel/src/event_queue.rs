//! Named event dispatch.
//!
//! An [`EventQueue`] maps event keys to handlers. [`EventQueue::signal`]
//! looks the handler up immediately, stamps the current time and enqueues a
//! work item that calls the handler later on the underlying
//! [`DispatchQueue`].

use alloc::collections::BTreeMap;
use alloc::string::String;
use core::borrow::Borrow;
use core::fmt;

use crate::clock;
use crate::dispatch::{Completion, DispatchQueue, QueueConfig};
use crate::error::KernelResult;
use crate::policy::{DefaultThreading, LockCell, Threading};
use crate::sync::Arc;

/// Handler invoked with the signal time (ms) and the signal arguments.
pub type Handler<A> = Arc<dyn Fn(u64, &A) -> Completion + Send + Sync + 'static>;

pub struct EventQueue<K = String, A = (), P: Threading = DefaultThreading> {
    queue: DispatchQueue<P>,
    handlers: LockCell<P::Lock, BTreeMap<K, Handler<A>>>,
}

impl<K, A, P> EventQueue<K, A, P>
where
    K: Ord + Send + 'static,
    A: Send + 'static,
    P: Threading,
{
    /// Creates a disabled queue with the default configuration.
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            queue: DispatchQueue::with_config(config),
            handlers: LockCell::new(BTreeMap::new()),
        }
    }

    /// Registers `handler` under `key`, replacing any previous handler.
    pub fn on<F, R>(&self, key: impl Into<K>, handler: F)
    where
        F: Fn(u64, &A) -> R + Send + Sync + 'static,
        R: Into<Completion>,
    {
        let handler: Handler<A> = Arc::new(move |time: u64, args: &A| handler(time, args).into());
        let key = key.into();
        self.handlers.with(|table| table.insert(key, handler));
    }

    /// Unregisters the handler for `key`. Work already enqueued for it still
    /// runs.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.handlers.with(|table| table.remove(key).is_some())
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.handlers.with(|table| table.contains_key(key))
    }

    /// Enqueues a call to the handler registered under `key`.
    ///
    /// # Panics
    ///
    /// Panics if no handler is registered under `key`.
    pub fn signal<Q>(&self, key: &Q, args: A) -> KernelResult<()>
    where
        K: Borrow<Q>,
        Q: Ord + fmt::Debug + ?Sized,
    {
        let handler = self.handler(key);
        let time = clock::now_ms();
        log::trace!("signal {key:?} at {time} ms");
        self.queue.enqueue(move || handler(time, &args))
    }

    /// Interrupt-context variant of [`signal`](Self::signal); fails instead
    /// of waiting when the queue is full.
    pub fn signal_from_irq<Q>(&self, key: &Q, args: A) -> KernelResult<()>
    where
        K: Borrow<Q>,
        Q: Ord + fmt::Debug + ?Sized,
    {
        let handler = self.handler(key);
        let time = clock::now_ms();
        self.queue.enqueue_from_irq(move || handler(time, &args))
    }

    fn handler<Q>(&self, key: &Q) -> Handler<A>
    where
        K: Borrow<Q>,
        Q: Ord + fmt::Debug + ?Sized,
    {
        match self.handlers.with(|table| table.get(key).cloned()) {
            Some(handler) => handler,
            None => panic!("no handler registered for event {key:?}"),
        }
    }

    /// Enqueues anonymous work on the underlying queue.
    pub fn enqueue<F, R>(&self, item: F) -> KernelResult<()>
    where
        F: FnMut() -> R + Send + 'static,
        R: Into<Completion>,
    {
        self.queue.enqueue(item)
    }

    pub fn queue(&self) -> &DispatchQueue<P> {
        &self.queue
    }

    pub fn enable(&self) -> KernelResult<()> {
        self.queue.enable()
    }

    pub fn disable(&self) {
        self.queue.disable();
    }

    pub fn running(&self) -> bool {
        self.queue.running()
    }

    pub fn process(&self) -> Option<Completion> {
        self.queue.process()
    }

    pub fn process_pending(&self) -> usize {
        self.queue.process_pending()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<K, A, P> Default for EventQueue<K, A, P>
where
    K: Ord + Send + 'static,
    A: Send + 'static,
    P: Threading,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A, P: Threading> fmt::Debug for EventQueue<K, A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

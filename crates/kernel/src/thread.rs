//! Named threads.
//!
//! A [`Thread`] is created stopped, runs one [`Runnable`] body per `start`,
//! and reports completion through a join [`Event`]. Threads are move-only:
//! the underlying task handle is never duplicated.

use core::fmt;

use embra_port::{spawn_task, TaskAttributes, TaskHandle};

use crate::atomic::AtomicBool;
use crate::error::KernelResult;
use crate::event::Event;
use crate::policy::Worker;
use crate::sync::{Arc, Mutex};
use crate::timeout::Timeout;

/// Body executed by a [`Thread`].
pub trait Runnable: Send + 'static {
    fn run(&mut self);
}

impl<F> Runnable for F
where
    F: FnMut() + Send + 'static,
{
    fn run(&mut self) {
        self()
    }
}

/// Creation parameters for a [`Thread`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadConfig {
    pub name: String,
    /// Advisory on hosted targets.
    pub priority: Option<u8>,
    pub stack_size: Option<usize>,
}

impl ThreadConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: None,
            stack_size: None,
        }
    }

    fn attributes(&self) -> TaskAttributes {
        TaskAttributes {
            name: self.name.clone(),
            priority: self.priority,
            stack_size: self.stack_size,
        }
    }
}

/// Builder returned by [`Thread::builder`].
#[derive(Debug, Clone)]
pub struct ThreadBuilder {
    config: ThreadConfig,
}

impl ThreadBuilder {
    pub fn priority(mut self, priority: u8) -> Self {
        self.config.priority = Some(priority);
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn build(self) -> Thread {
        Thread::with_config(self.config)
    }
}

struct ThreadShared {
    running: AtomicBool,
    stop_requested: AtomicBool,
    join: Event,
}

/// Marks the thread finished when the body returns or unwinds.
struct Finished(Arc<ThreadShared>);

impl Drop for Finished {
    fn drop(&mut self) {
        self.0.running.store(false);
        self.0.join.signal();
    }
}

/// Cooperative stop flag handed to a thread body.
#[derive(Clone)]
pub struct StopToken {
    shared: Arc<ThreadShared>,
}

impl StopToken {
    pub fn is_stop_requested(&self) -> bool {
        self.shared.stop_requested.load()
    }
}

impl fmt::Debug for StopToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopToken")
            .field("stop_requested", &self.is_stop_requested())
            .finish()
    }
}

pub struct Thread {
    config: ThreadConfig,
    shared: Arc<ThreadShared>,
    handle: Mutex<Option<TaskHandle>>,
}

impl Thread {
    /// Creates a stopped thread with default priority and stack size.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(ThreadConfig::new(name))
    }

    /// Starts a [`ThreadBuilder`] for a thread called `name`.
    pub fn builder(name: impl Into<String>) -> ThreadBuilder {
        ThreadBuilder {
            config: ThreadConfig::new(name),
        }
    }

    /// Creates a stopped thread from `config`.
    pub fn with_config(config: ThreadConfig) -> Self {
        Self {
            config,
            shared: Arc::new(ThreadShared {
                running: AtomicBool::new(false),
                stop_requested: AtomicBool::new(false),
                join: Event::new(),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Creates a thread and immediately starts `body` on it.
    pub fn spawn(name: impl Into<String>, body: impl Runnable) -> KernelResult<Self> {
        let mut thread = Self::new(name);
        thread.start(body)?;
        Ok(thread)
    }

    /// Name given at construction; also used for the platform task.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration the thread was created with.
    pub fn config(&self) -> &ThreadConfig {
        &self.config
    }

    /// True from `start` until the body returns.
    pub fn is_running(&self) -> bool {
        self.shared.running.load()
    }

    /// Token the body can poll to honour [`stop`](Self::stop).
    pub fn stop_token(&self) -> StopToken {
        StopToken {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Starts `body` on a new platform task.
    ///
    /// # Panics
    ///
    /// Panics if the thread is already running.
    pub fn start(&mut self, body: impl Runnable) -> KernelResult<()> {
        assert!(!self.is_running(), "thread `{}` started twice", self.config.name);

        let mut slot = self.handle.lock();
        if let Some(mut previous) = slot.take() {
            previous.join()?;
        }

        self.shared.stop_requested.store(false);
        self.shared.running.store(true);

        let shared = Arc::clone(&self.shared);
        let mut body = body;
        let spawned = spawn_task(&self.config.attributes(), move || {
            let _finished = Finished(shared);
            body.run();
        });

        match spawned {
            Ok(handle) => {
                log::debug!("thread `{}` started", self.config.name);
                *slot = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.shared.running.store(false);
                Err(err.into())
            }
        }
    }

    /// Blocks until the body has returned.
    ///
    /// Joining from inside the thread itself returns immediately.
    pub fn join(&mut self) {
        let mut slot = self.handle.lock();
        let Some(handle) = slot.as_mut() else {
            return;
        };

        if handle.is_current() {
            log::warn!("thread `{}` attempted to join itself", self.config.name);
            return;
        }

        let shared = &self.shared;
        shared.join.wait_for(|| !shared.running.load(), Timeout::FOREVER);

        if let Err(err) = handle.join() {
            log::error!("{err}");
        }
        *slot = None;
    }

    /// Requests the body to stop and waits for it.
    ///
    /// Stopping is cooperative: bodies observe the request through their
    /// [`StopToken`].
    pub fn stop(&mut self) {
        self.shared.stop_requested.store(true);
        self.join();
        log::debug!("thread `{}` stopped", self.config.name);
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.config.name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        } else {
            self.join();
        }
    }
}

impl Worker for Thread {
    fn named(name: &str) -> Self {
        Thread::new(name)
    }

    fn launch<F: FnMut() + Send + 'static>(&mut self, body: F) -> KernelResult<()> {
        self.start(body)
    }

    fn halt(&mut self) {
        self.stop();
    }

    fn is_running(&self) -> bool {
        Thread::is_running(self)
    }

    fn pause(ms: u32) {
        embra_port::sleep(u64::from(ms));
    }
}

/// Yields the calling thread's time slice.
pub fn yield_now() {
    embra_port::yield_now();
}

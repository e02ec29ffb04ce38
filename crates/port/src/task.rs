//! Task creation for the hosted port.
//!
//! Tasks map one-to-one onto OS threads. Priorities are recorded for
//! diagnostics only; the host scheduler does not honour them.

use std::fmt;
use std::thread::{self, JoinHandle};

use crate::error::PortError;

/// Smallest stack the hosted port hands to a task.
const MIN_STACK_SIZE: usize = 16 * 1024;

/// Attributes used to create a task.
#[derive(Debug, Clone, Default)]
pub struct TaskAttributes {
    pub name: String,
    pub priority: Option<u8>,
    pub stack_size: Option<usize>,
}

impl TaskAttributes {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: None,
            stack_size: None,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }
}

/// Handle to a running (or finished) task.
pub struct TaskHandle {
    name: String,
    inner: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the calling thread is this task.
    pub fn is_current(&self) -> bool {
        self.inner
            .as_ref()
            .map_or(false, |handle| handle.thread().id() == thread::current().id())
    }

    /// Returns true once the task entry has returned.
    pub fn is_finished(&self) -> bool {
        self.inner.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits for the task entry to return.
    ///
    /// Joining a task from inside itself, or joining twice, is a no-op.
    pub fn join(&mut self) -> Result<(), PortError> {
        if self.is_current() {
            return Ok(());
        }

        match self.inner.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PortError::TaskPanicked(self.name.clone())),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Creates a task running `entry`.
pub fn spawn_task<F>(attrs: &TaskAttributes, entry: F) -> Result<TaskHandle, PortError>
where
    F: FnOnce() + Send + 'static,
{
    let mut builder = thread::Builder::new().name(attrs.name.clone());
    if let Some(size) = attrs.stack_size {
        builder = builder.stack_size(size.max(MIN_STACK_SIZE));
    }

    let handle = builder.spawn(entry).map_err(|source| PortError::Spawn {
        name: attrs.name.clone(),
        source,
    })?;

    log::debug!(
        "task `{}` created (priority {:?}, stack {:?})",
        attrs.name,
        attrs.priority,
        attrs.stack_size
    );

    Ok(TaskHandle {
        name: attrs.name.clone(),
        inner: Some(handle),
    })
}

//! Watchdog collaborator kicked by queue workers.

use crate::timeout::Timeout;

/// Hardware or software watchdog fed by long-running workers.
///
/// All methods default to doing nothing.
pub trait Watchdog: Send + Sync {
    fn enable(&self, _timeout: Timeout) {}
    fn disable(&self) {}
    fn reset(&self) {}
}

/// Watchdog that ignores every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWatchdog;

impl Watchdog for NoWatchdog {}

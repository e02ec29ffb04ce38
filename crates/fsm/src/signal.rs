//! Event symbols and their payloads.

use alloc::sync::Arc;
use core::any::Any;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use embra_kernel::clock;

/// Input symbol of a state machine's alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Symbol(pub u16);

impl From<u16> for Symbol {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Payload attached to a raised symbol.
///
/// Signals are cheap to clone; the payload is shared, never copied.
#[derive(Clone)]
pub struct Signal {
    moment: u64,
    payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl Signal {
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self::from_arc(Arc::new(payload))
    }

    pub fn from_arc(payload: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            moment: clock::now_ms(),
            payload: Some(payload),
        }
    }

    /// A signal without payload.
    pub fn empty() -> Self {
        Self {
            moment: clock::now_ms(),
            payload: None,
        }
    }

    /// Millisecond time at which the signal was created.
    pub fn time(&self) -> u64 {
        self.moment
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(|payload| payload.downcast_ref::<T>())
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("moment", &self.moment)
            .field("payload", &self.payload.is_some())
            .finish()
    }
}

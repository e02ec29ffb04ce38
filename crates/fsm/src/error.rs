use core::fmt;

use embra_kernel::KernelError;

use crate::state::StateId;

#[derive(Debug)]
pub enum FsmError {
    /// `start` was called before a start state was set.
    NoStartState,
    /// A checked start found the machine incomplete or non-deterministic.
    Invalid,
    UnknownState(StateId),
    DuplicateState(StateId),
    Kernel(KernelError),
}

impl fmt::Display for FsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStartState => write!(f, "no start state configured"),
            Self::Invalid => write!(f, "state machine is not valid"),
            Self::UnknownState(id) => write!(f, "state {id} is not part of the machine"),
            Self::DuplicateState(id) => write!(f, "state {id} was already added"),
            Self::Kernel(err) => write!(f, "kernel error: {err}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FsmError {}

impl From<KernelError> for FsmError {
    fn from(value: KernelError) -> Self {
        Self::Kernel(value)
    }
}

use core::fmt;

#[cfg(feature = "std")]
use embra_port::PortError;

/// Errors returned by kernel services.
#[derive(Debug)]
pub enum KernelError {
    /// The queue held `capacity` items and no slot freed up in time.
    QueueFull { capacity: usize },
    /// A bounded wait elapsed without the awaited signal.
    Timeout,
    #[cfg(feature = "std")]
    Port(PortError),
}

pub type KernelResult<T> = Result<T, KernelError>;

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull { capacity } => write!(f, "queue is full ({capacity} items)"),
            Self::Timeout => write!(f, "timed out"),
            #[cfg(feature = "std")]
            Self::Port(err) => write!(f, "port error: {err}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for KernelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Port(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(feature = "std")]
impl From<PortError> for KernelError {
    fn from(value: PortError) -> Self {
        Self::Port(value)
    }
}

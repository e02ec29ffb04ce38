use std::io;

use thiserror::Error;

/// Errors reported by the hosted platform services.
#[derive(Error, Debug)]
pub enum PortError {
    #[error("unable to spawn task `{name}`: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("task `{0}` panicked")]
    TaskPanicked(String),
    #[error("timer `{0}` has a zero interval")]
    InvalidInterval(String),
}

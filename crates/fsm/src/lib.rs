//! # embra-fsm
//!
//! Table-driven finite state machines. States carry an optional entry action
//! and a list of guarded transitions keyed by [`Symbol`]; raised events are
//! queued together with a [`Signal`] payload and consumed one cycle at a
//! time.
//!
//! ## Module Overview
//! - [`signal`]    – Alphabet symbols and signal payloads.
//! - [`state`]     – States, transitions and the action context.
//! - [`base`]      – Transition table, pending queue and the cycle step.
//! - [`fsm`]       – Synchronous machine driven by the caller.
//! - [`async_fsm`] – Machine driven by its own worker thread (`std`).

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(feature = "std")]
pub mod async_fsm;
pub mod base;
mod error;
pub mod fsm;
pub mod signal;
pub mod state;

#[cfg(feature = "std")]
pub use async_fsm::AsyncFsm;
pub use base::{FsmBase, FsmConfig, FsmStatus};
pub use error::FsmError;
pub use fsm::Fsm;
pub use signal::{Signal, Symbol};
pub use state::{State, StateContext, StateId, Transition};

#[cfg(test)]
mod tests;

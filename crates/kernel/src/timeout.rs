//! Millisecond wait bounds.

use core::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Upper bound for a blocking wait, in milliseconds.
///
/// [`Timeout::FOREVER`] is the reserved "never time out" value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Timeout(Option<u32>);

impl Timeout {
    pub const FOREVER: Self = Self(None);
    pub const IMMEDIATE: Self = Self(Some(0));

    pub const fn from_millis(ms: u32) -> Self {
        Self(Some(ms))
    }

    pub const fn as_millis(self) -> Option<u32> {
        self.0
    }

    pub const fn is_forever(self) -> bool {
        self.0.is_none()
    }

    pub fn as_duration(self) -> Option<Duration> {
        self.0.map(|ms| Duration::from_millis(u64::from(ms)))
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self::FOREVER
    }
}

impl From<u32> for Timeout {
    fn from(ms: u32) -> Self {
        Self::from_millis(ms)
    }
}

impl From<Duration> for Timeout {
    fn from(value: Duration) -> Self {
        let ms = value.as_millis().min(u128::from(u32::MAX)) as u32;
        Self::from_millis(ms)
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(value: Option<Duration>) -> Self {
        value.map_or(Self::FOREVER, Self::from)
    }
}

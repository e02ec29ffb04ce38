mod table;
mod transitions;

use crate::signal::Signal;

/// Payload used by guarded transitions in these tests.
#[derive(Debug)]
pub(crate) struct Go {
    pub ok: bool,
}

pub(crate) fn go(ok: bool) -> Signal {
    Signal::new(Go { ok })
}

pub(crate) fn is_ok(signal: &Signal) -> bool {
    signal.downcast_ref::<Go>().map_or(false, |go| go.ok)
}

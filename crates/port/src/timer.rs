//! Timer service.
//!
//! Each [`PlatformTimer`] owns a service task that sleeps until the armed
//! deadline and then invokes the timer callback with no port lock held.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::clock;
use crate::error::PortError;
use crate::task::{spawn_task, TaskAttributes, TaskHandle};

/// Callback invoked each time a timer fires.
pub type TimerCallback = Box<dyn FnMut() + Send + 'static>;

/// Firing mode of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// Fires once per `start`/`reset`.
    OneShot,
    /// Re-arms itself after every expiry.
    Continuous,
}

struct TimerState {
    armed: bool,
    deadline: Option<Instant>,
    shutdown: bool,
    fired: u64,
}

struct Shared {
    interval: Duration,
    mode: TimerMode,
    state: Mutex<TimerState>,
    cond: Condvar,
}

pub struct PlatformTimer {
    name: String,
    shared: Arc<Shared>,
    service: Option<TaskHandle>,
}

impl PlatformTimer {
    /// Creates a disarmed timer. A zero interval is rejected.
    pub fn create(
        name: impl Into<String>,
        interval: Duration,
        mode: TimerMode,
        callback: TimerCallback,
    ) -> Result<Self, PortError> {
        let name = name.into();
        if interval.is_zero() {
            return Err(PortError::InvalidInterval(name));
        }

        let shared = Arc::new(Shared {
            interval,
            mode,
            state: Mutex::new(TimerState {
                armed: false,
                deadline: None,
                shutdown: false,
                fired: 0,
            }),
            cond: Condvar::new(),
        });

        let service = {
            let shared = Arc::clone(&shared);
            let attrs = TaskAttributes::new(format!("tmr-{name}"));
            spawn_task(&attrs, move || service_loop(&shared, callback))?
        };

        Ok(Self {
            name,
            shared,
            service: Some(service),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    pub fn mode(&self) -> TimerMode {
        self.shared.mode
    }

    /// Arms the timer to fire one interval from now.
    pub fn start(&self) {
        let mut state = self.shared.state.lock();
        state.armed = true;
        state.deadline = Some(Instant::now() + self.shared.interval);
        self.shared.cond.notify_all();
    }

    /// Disarms the timer. A callback already running completes.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        state.armed = false;
        state.deadline = None;
        self.shared.cond.notify_all();
    }

    /// Restarts the countdown from now, arming the timer if needed.
    pub fn reset(&self) {
        self.start();
    }

    pub fn is_armed(&self) -> bool {
        self.shared.state.lock().armed
    }

    /// Millisecond tick at which the timer next fires, if armed.
    pub fn expiry(&self) -> Option<u64> {
        let state = self.shared.state.lock();
        state.deadline.filter(|_| state.armed).map(clock::ms_at)
    }

    /// Returns true once the timer has fired and is no longer armed.
    pub fn is_expired(&self) -> bool {
        let state = self.shared.state.lock();
        !state.armed && state.fired > 0
    }

    /// Number of times the callback has been invoked.
    pub fn fired(&self) -> u64 {
        self.shared.state.lock().fired
    }
}

fn service_loop(shared: &Shared, mut callback: TimerCallback) {
    let mut state = shared.state.lock();

    loop {
        if state.shutdown {
            break;
        }

        let deadline = match (state.armed, state.deadline) {
            (true, Some(deadline)) => deadline,
            _ => {
                shared.cond.wait(&mut state);
                continue;
            }
        };

        if Instant::now() < deadline {
            shared.cond.wait_until(&mut state, deadline);
            continue;
        }

        match shared.mode {
            TimerMode::OneShot => {
                state.armed = false;
                state.deadline = None;
            }
            TimerMode::Continuous => {
                let now = Instant::now();
                let mut next = deadline + shared.interval;
                if next <= now {
                    next = now + shared.interval;
                }
                state.deadline = Some(next);
            }
        }
        state.fired += 1;

        MutexGuard::unlocked(&mut state, || callback());
    }
}

impl Drop for PlatformTimer {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.armed = false;
            self.shared.cond.notify_all();
        }

        if let Some(mut service) = self.service.take() {
            if let Err(err) = service.join() {
                log::warn!("timer `{}` service task ended abnormally: {err}", self.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_timer(mode: TimerMode, ms: u64) -> (PlatformTimer, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let timer = PlatformTimer::create(
            "test",
            Duration::from_millis(ms),
            mode,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .expect("timer creation");
        (timer, hits)
    }

    #[test]
    fn zero_interval_is_rejected() {
        let result = PlatformTimer::create("zero", Duration::ZERO, TimerMode::OneShot, Box::new(|| {}));
        assert!(matches!(result, Err(PortError::InvalidInterval(_))));
    }

    #[test]
    fn one_shot_fires_once() {
        let (timer, hits) = counting_timer(TimerMode::OneShot, 10);
        timer.start();
        assert!(timer.expiry().is_some());

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(timer.is_expired());
        assert!(timer.expiry().is_none());
    }

    #[test]
    fn continuous_rearms_until_stopped() {
        let (timer, hits) = counting_timer(TimerMode::Continuous, 5);
        timer.start();
        std::thread::sleep(Duration::from_millis(60));
        timer.stop();
        std::thread::sleep(Duration::from_millis(10));

        let fired = hits.load(Ordering::SeqCst);
        assert!(fired >= 2, "continuous timer fired {fired} times");
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(hits.load(Ordering::SeqCst), fired);
    }

    #[test]
    fn unstarted_timer_never_fires() {
        let (timer, hits) = counting_timer(TimerMode::OneShot, 5);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!timer.is_expired());
    }
}

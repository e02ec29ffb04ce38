//! Software timers.
//!
//! A [`Timer`] calls its [`TimerTick`] from the platform timer service. The
//! tick is the only place user code runs; one-shot timers do not fire again
//! after their tick returns, continuous timers re-arm themselves.

use core::fmt;
use core::time::Duration;

use embra_port::PlatformTimer;
pub use embra_port::TimerMode;

use crate::error::KernelResult;

/// Code run on every expiry.
pub trait TimerTick: Send + 'static {
    fn tick(&mut self);
}

impl<F> TimerTick for F
where
    F: FnMut() + Send + 'static,
{
    fn tick(&mut self) {
        self()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    pub name: String,
    pub interval: Duration,
    pub mode: TimerMode,
}

impl TimerConfig {
    /// One-shot timer firing `interval` after being started.
    pub fn one_shot(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            mode: TimerMode::OneShot,
        }
    }

    /// Timer firing every `interval` until stopped.
    pub fn continuous(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            mode: TimerMode::Continuous,
        }
    }
}

pub struct Timer {
    config: TimerConfig,
    platform: Option<PlatformTimer>,
}

impl Timer {
    /// Creates an unarmed timer; nothing runs until [`start`](Self::start).
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            platform: None,
        }
    }

    /// Name of the timer and of its service task.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Time between start and expiry, and between continuous ticks.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Whether the timer fires once or keeps firing.
    pub fn mode(&self) -> TimerMode {
        self.config.mode
    }

    /// Arms the timer with `tick` as its expiry handler, replacing any
    /// previous handler.
    pub fn start(&mut self, tick: impl TimerTick) -> KernelResult<()> {
        // Tear down the previous service before creating a new one.
        self.platform = None;

        let mut tick = tick;
        let platform = PlatformTimer::create(
            self.config.name.clone(),
            self.config.interval,
            self.config.mode,
            Box::new(move || tick.tick()),
        )?;
        platform.start();
        log::debug!("timer `{}` started ({:?})", self.config.name, self.config.mode);

        self.platform = Some(platform);
        Ok(())
    }

    /// Disarms the timer. The handler is kept for [`reset`](Self::reset).
    pub fn stop(&self) {
        if let Some(platform) = &self.platform {
            platform.stop();
        }
    }

    /// Restarts the countdown from now. Does nothing before the first start.
    pub fn reset(&self) {
        if let Some(platform) = &self.platform {
            platform.reset();
        }
    }

    pub fn is_running(&self) -> bool {
        self.platform.as_ref().map_or(false, PlatformTimer::is_armed)
    }

    /// Millisecond tick of the next expiry, if armed.
    pub fn expiry(&self) -> Option<u64> {
        self.platform.as_ref().and_then(PlatformTimer::expiry)
    }

    /// True once the timer has fired and is no longer armed.
    pub fn is_expired(&self) -> bool {
        self.platform.as_ref().map_or(false, PlatformTimer::is_expired)
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::Atomic;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn one_shot_timer_fires_once() {
        let hits = Arc::new(Atomic::<u32>::new(0));
        let counter = Arc::clone(&hits);

        let mut timer = Timer::new(TimerConfig::one_shot("once", Duration::from_millis(10)));
        assert!(!timer.is_expired());
        timer.start(move || {
            counter.fetch_add(1);
        })
        .expect("start");
        assert!(timer.is_running());
        assert!(timer.expiry().is_some());

        thread::sleep(Duration::from_millis(80));
        assert_eq!(hits.load(), 1);
        assert!(timer.is_expired());
        assert!(!timer.is_running());
    }

    #[test]
    fn reset_rearms_a_fired_one_shot() {
        let hits = Arc::new(Atomic::<u32>::new(0));
        let counter = Arc::clone(&hits);

        let mut timer = Timer::new(TimerConfig::one_shot("rearm", Duration::from_millis(5)));
        timer.start(move || {
            counter.fetch_add(1);
        })
        .expect("start");
        thread::sleep(Duration::from_millis(50));
        timer.reset();
        thread::sleep(Duration::from_millis(50));

        assert_eq!(hits.load(), 2);
    }

    #[test]
    fn continuous_timer_stops_on_request() {
        let hits = Arc::new(Atomic::<u32>::new(0));
        let counter = Arc::clone(&hits);

        let mut timer = Timer::new(TimerConfig::continuous("tick", Duration::from_millis(5)));
        timer.start(move || {
            counter.fetch_add(1);
        })
        .expect("start");
        thread::sleep(Duration::from_millis(60));
        timer.stop();
        thread::sleep(Duration::from_millis(10));

        let fired = hits.load();
        assert!(fired >= 2);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(hits.load(), fired);
    }

    #[test]
    fn zero_interval_is_reported() {
        let mut timer = Timer::new(TimerConfig::one_shot("zero", Duration::ZERO));
        assert!(timer.start(|| {}).is_err());
    }
}

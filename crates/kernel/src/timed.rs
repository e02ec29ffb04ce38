//! Tick-driven event scheduling.
//!
//! A [`TimerEventQueue`] keeps a tick counter advanced by [`feed`] and a list
//! of scheduled records. [`process_ticks`] is called by the owner; every due
//! record signals its event on the underlying [`EventQueue`]. Handlers receive
//! the signal time in milliseconds and the tick at which the record fired.
//!
//! [`feed`]: TimerEventQueue::feed
//! [`process_ticks`]: TimerEventQueue::process_ticks

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::time::Duration;

use crate::atomic::Atomic;
use crate::clock;
use crate::dispatch::{Completion, QueueConfig};
use crate::error::KernelResult;
use crate::event_queue::EventQueue;
use crate::policy::{DefaultThreading, LockCell, Threading};

/// Milliseconds per second; tick periods are derived from it.
const RATE: u64 = 1000;

#[derive(Debug, Clone)]
pub struct TimedQueueConfig {
    /// Ticks per second fed to the queue.
    pub frequency_hz: u64,
    pub initial_tick: u64,
    pub queue: QueueConfig,
}

impl Default for TimedQueueConfig {
    fn default() -> Self {
        Self {
            frequency_hz: RATE,
            initial_tick: 0,
            queue: QueueConfig::default(),
        }
    }
}

impl TimedQueueConfig {
    pub fn with_frequency(mut self, frequency_hz: u64) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    pub fn with_initial_tick(mut self, tick: u64) -> Self {
        self.initial_tick = tick;
        self
    }

    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }
}

#[derive(Debug, Clone)]
struct TimerRecord {
    id: u64,
    moment: u64,
    event: String,
    interval: u64,
    repeating: bool,
}

pub struct TimerEventQueue<P: Threading = DefaultThreading> {
    events: EventQueue<String, u64, P>,
    tick: Atomic<u64>,
    sequence: Atomic<u64>,
    work: LockCell<P::Lock, Vec<TimerRecord>>,
    offset: u64,
    period: u64,
}

impl<P: Threading> TimerEventQueue<P> {
    /// Creates a 1 kHz queue starting at tick zero and enables it.
    pub fn new() -> KernelResult<Self> {
        Self::with_config(TimedQueueConfig::default())
    }

    /// Creates a queue and enables its worker.
    pub fn with_config(config: TimedQueueConfig) -> KernelResult<Self> {
        let period = (RATE / config.frequency_hz.clamp(1, RATE)).max(1);
        let queue = Self {
            events: EventQueue::with_config(config.queue),
            tick: Atomic::new(config.initial_tick),
            sequence: Atomic::new(0),
            work: LockCell::new(Vec::new()),
            offset: clock::now_ms() / period,
            period,
        };
        queue.events.enable()?;
        Ok(queue)
    }

    fn ms_to_ticks(&self, ms: u64) -> u64 {
        ms / self.period
    }

    fn schedule(&self, record: TimerRecord) {
        log::trace!("event `{}` scheduled at tick {}", record.event, record.moment);
        self.work.with(|work| work.push(record));
    }

    /// Advances the tick counter by one.
    pub fn feed(&self) {
        self.tick.fetch_add(1);
    }

    /// Interrupt-context variant of [`feed`](Self::feed).
    pub fn feed_irq(&self) {
        self.tick.fetch_add(1);
    }

    /// Registers `handler` for `event` without scheduling anything.
    pub fn on<F, R>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(u64, &u64) -> R + Send + Sync + 'static,
        R: Into<Completion>,
    {
        self.events.on(event, handler);
    }

    /// Schedules `event` once, at the tick corresponding to `time` ms.
    pub fn at(&self, time: u64, event: impl Into<String>) {
        self.schedule(TimerRecord {
            id: self.sequence.post_increment(),
            moment: self.ms_to_ticks(time),
            event: event.into(),
            interval: 0,
            repeating: false,
        });
    }

    /// Schedules `event` once, at a wall-clock moment given as the time since
    /// the Unix epoch. The start-up offset is subtracted.
    pub fn at_wallclock(&self, moment: Duration, event: impl Into<String>) {
        let ms = moment.as_secs().saturating_mul(1000);
        self.schedule(TimerRecord {
            id: self.sequence.post_increment(),
            moment: self.ms_to_ticks(ms).saturating_sub(self.offset),
            event: event.into(),
            interval: 0,
            repeating: false,
        });
    }

    /// Like [`at_wallclock`](Self::at_wallclock), registering `handler` first.
    pub fn at_wallclock_with<F, R>(&self, moment: Duration, event: impl Into<String>, handler: F)
    where
        F: Fn(u64, &u64) -> R + Send + Sync + 'static,
        R: Into<Completion>,
    {
        let event = event.into();
        self.events.on(event.clone(), handler);
        self.at_wallclock(moment, event);
    }

    /// Schedules `event` once, `ms` milliseconds of tick time from now.
    pub fn in_ms(&self, ms: u64, event: impl Into<String>) {
        self.schedule(TimerRecord {
            id: self.sequence.post_increment(),
            moment: self.tick.load() + self.ms_to_ticks(ms),
            event: event.into(),
            interval: 0,
            repeating: false,
        });
    }

    /// Same as [`in_ms`](Self::in_ms).
    pub fn once(&self, ms: u64, event: impl Into<String>) {
        self.in_ms(ms, event);
    }

    /// Registers `handler` and schedules `event` every `interval` ms.
    pub fn every<F, R>(&self, interval: u64, event: impl Into<String>, handler: F)
    where
        F: Fn(u64, &u64) -> R + Send + Sync + 'static,
        R: Into<Completion>,
    {
        let event = event.into();
        let interval = self.ms_to_ticks(interval).max(1);
        self.events.on(event.clone(), handler);
        self.schedule(TimerRecord {
            id: self.sequence.post_increment(),
            moment: self.tick.load() + interval,
            event,
            interval,
            repeating: true,
        });
    }

    /// Drops every pending record for `event` and unregisters its handler.
    pub fn remove(&self, event: &str) {
        self.work.with(|work| work.retain(|record| record.event != event));
        self.events.remove(event);
    }

    /// Signals every record that is due.
    ///
    /// Repeating records are re-armed relative to the current tick before
    /// they signal; one-shot records are dropped once signalled. Returns the
    /// number of events signalled.
    ///
    /// If the underlying queue is full the error is returned and every due
    /// record that was not signalled stays scheduled, so the next call picks
    /// it up again.
    ///
    /// # Panics
    ///
    /// Panics if a due record names an event without a handler.
    pub fn process_ticks(&self) -> KernelResult<usize> {
        let now = self.tick.load();

        let due: Vec<TimerRecord> = self.work.with(|work| {
            let mut due = Vec::new();
            work.retain_mut(|record| {
                if now < record.moment {
                    return true;
                }

                due.push(record.clone());
                if record.repeating {
                    record.moment = now + record.interval;
                    true
                } else {
                    false
                }
            });
            due
        });

        for (index, record) in due.iter().enumerate() {
            if let Err(err) = self.events.signal(record.event.as_str(), now) {
                let missed = &due[index..];
                log::warn!("{} due events left scheduled: {err}", missed.len());
                self.reschedule(missed);
                return Err(err);
            }
        }
        Ok(due.len())
    }

    /// Puts records taken by `process_ticks` back in their due state.
    fn reschedule(&self, missed: &[TimerRecord]) {
        self.work.with(|work| {
            for record in missed {
                if !record.repeating {
                    work.push(record.clone());
                    continue;
                }

                if let Some(armed) = work.iter_mut().find(|armed| armed.id == record.id) {
                    armed.moment = record.moment;
                }
            }
        });
    }

    /// Sets the tick counter.
    pub fn set_ticks(&self, ticks: u64) {
        self.tick.store(ticks);
    }

    /// Sets the tick counter from a wall-clock moment since the Unix epoch.
    pub fn set_time(&self, time: Duration) {
        let ms = time.as_secs().saturating_mul(1000);
        self.tick.store(self.ms_to_ticks(ms));
    }

    /// Current tick count.
    pub fn ticks(&self) -> u64 {
        self.tick.load()
    }

    /// Tick count at construction, derived from the platform clock.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Milliseconds per tick.
    pub fn period(&self) -> u64 {
        self.period
    }

    /// Number of scheduled records.
    pub fn pending(&self) -> usize {
        self.work.with(|work| work.len())
    }

    /// The event queue records are signalled on.
    pub fn events(&self) -> &EventQueue<String, u64, P> {
        &self.events
    }

    /// Restarts the worker after [`disable`](Self::disable).
    pub fn enable(&self) -> KernelResult<()> {
        self.events.enable()
    }

    pub fn disable(&self) {
        self.events.disable();
    }

    pub fn running(&self) -> bool {
        self.events.running()
    }

    pub fn process(&self) -> Option<Completion> {
        self.events.process()
    }

    pub fn process_pending(&self) -> usize {
        self.events.process_pending()
    }
}

impl<P: Threading> fmt::Debug for TimerEventQueue<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEventQueue")
            .field("tick", &self.ticks())
            .field("offset", &self.offset)
            .field("period", &self.period)
            .field("pending", &self.pending())
            .finish()
    }
}

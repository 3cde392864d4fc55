//! Cooperative tick loop.
//!
//! Each tick runs the radio worker and then one step of the active engine.
//! A stop request on the watch channel is honored at the next tick: the
//! engine halts (deactivate, idle) and the loop returns.

use std::convert::Infallible;
use std::time::Duration;

use cardlab_emulator::Listener;
use cardlab_hardware::Transceiver;
use cardlab_reader::{HandledCard, Poller};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

/// A state machine the scheduler can drive.
pub trait Engine {
    /// Output of a step worth reporting.
    type Event;

    /// Run the radio worker.
    fn service_radio(&mut self);

    /// Advance the engine by one step.
    fn step(&mut self) -> Option<Self::Event>;

    /// Deactivate the radio and return to idle.
    fn halt(&mut self);
}

impl<R: Transceiver + ?Sized> Engine for Poller<'_, R> {
    type Event = HandledCard;

    fn service_radio(&mut self) {
        Poller::service_radio(self);
    }

    fn step(&mut self) -> Option<HandledCard> {
        self.cycle()
    }

    fn halt(&mut self) {
        Poller::halt(self);
    }
}

impl<R: Transceiver + ?Sized> Engine for Listener<'_, R> {
    type Event = Infallible;

    fn service_radio(&mut self) {
        Listener::service_radio(self);
    }

    fn step(&mut self) -> Option<Infallible> {
        self.cycle();
        None
    }

    fn halt(&mut self) {
        Listener::halt(self);
    }
}

/// Outcome of [`Scheduler::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport<E> {
    /// Ticks that stepped the engine.
    pub ticks: u64,
    pub events: Vec<E>,
}

impl<E> Default for RunReport<E> {
    fn default() -> Self {
        Self {
            ticks: 0,
            events: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduler {
    tick_interval: Duration,
}

impl Scheduler {
    /// # Panics
    /// Panics if `tick_interval` is zero.
    pub fn new(tick_interval: Duration) -> Self {
        assert!(!tick_interval.is_zero(), "tick interval must be positive");
        Self { tick_interval }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Drive `engine` until `stop` becomes `true` or its sender is dropped.
    ///
    /// Steps run inline on the calling task. A step may block for one
    /// FWT-bounded transmit, or for `poller.retry_delay_ms` between READ
    /// retries; other tasks on the same worker thread stall for that long.
    pub async fn run<E: Engine>(
        &self,
        engine: &mut E,
        stop: watch::Receiver<bool>,
    ) -> RunReport<E::Event> {
        let mut interval = time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut report = RunReport::default();

        loop {
            interval.tick().await;
            let closed = stop.has_changed().is_err();
            if closed || *stop.borrow() {
                debug!(closed, "Stop observed");
                engine.halt();
                break;
            }

            engine.service_radio();
            if let Some(event) = engine.step() {
                report.events.push(event);
            }
            report.ticks += 1;
        }

        info!(ticks = report.ticks, events = report.events.len(), "Scheduler stopped");
        report
    }
}

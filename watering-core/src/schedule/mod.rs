//! Closed-loop dose scheduler.
//!
//! Each tick the scheduler trims the trailing event log, turns its length into
//! a daily volume estimate and feeds that estimate through a PID controller. A
//! dose fires only when the control value reaches one dose worth of water, the
//! clock sits inside a watering window and the dead-time since the previous
//! dose has elapsed.

mod event_log;
mod gates;
mod pid;

use core::convert::Infallible;

pub use event_log::{
    EVENT_LOG_CAPACITY, EventHistory, EventLog, MovingAverageEstimator, RecordOutcome,
};
pub use gates::{DeadTimeGuard, WindowGate};
pub use pid::{PidController, PidGains, PidTerms};

use crate::Timestamp;
use crate::config::ControlConfig;

/// Durable storage for the dose history.
///
/// `load` runs once at startup; `store` runs synchronously after every
/// recorded dose with the full retained log.
pub trait EventStore {
    type Error;

    fn load(&mut self) -> Result<EventHistory, Self::Error>;

    fn store(&mut self, events: &[Timestamp]) -> Result<(), Self::Error>;
}

/// Store for targets without persistent memory; every boot is a cold start.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopEventStore;

impl EventStore for NoopEventStore {
    type Error = Infallible;

    fn load(&mut self) -> Result<EventHistory, Self::Error> {
        Ok(EventHistory::new())
    }

    fn store(&mut self, _events: &[Timestamp]) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Observability data produced by one scheduler iteration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Diagnostics {
    /// Estimated liters per day.
    pub average: f64,
    pub control: f64,
    pub terms: PidTerms,
    /// Integral error after the iteration (including any pullback).
    pub integral_error: f64,
}

/// Outcome of [`WateringScheduler::run_single_iteration`].
#[derive(Debug, PartialEq)]
pub struct Decision<E> {
    pub fire: bool,
    pub diagnostics: Diagnostics,
    /// Persistence failure raised while storing the log after a dose.
    pub store_error: Option<E>,
    /// Entry dropped because the log was already full.
    pub evicted: Option<Timestamp>,
}

/// Result of seeding the scheduler from persistent storage.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RestoreSummary {
    pub loaded: usize,
    pub retained: usize,
    pub last_event_time: Option<Timestamp>,
}

/// Scheduling core: owns the event log, PID state and control config.
#[derive(Clone, Debug)]
pub struct WateringScheduler {
    config: ControlConfig,
    log: EventLog,
    pid: PidController,
    last_event_time: Option<Timestamp>,
    last_diagnostics: Option<Diagnostics>,
}

impl WateringScheduler {
    /// Creates a cold scheduler. `config` is expected to be validated.
    #[must_use]
    pub fn new(config: ControlConfig) -> Self {
        Self {
            pid: PidController::new(&config),
            config,
            log: EventLog::new(),
            last_event_time: None,
            last_diagnostics: None,
        }
    }

    /// Seeds the event log from `store`.
    ///
    /// Entries later than `now` or out of order are dropped. The newest
    /// surviving entry becomes the last dose time so a reboot cannot shorten
    /// the dead-time. On a load error the log stays empty and the error is
    /// handed back.
    pub fn restore<S: EventStore>(
        &mut self,
        store: &mut S,
        now: Timestamp,
    ) -> Result<RestoreSummary, S::Error> {
        let entries = match store.load() {
            Ok(entries) => entries,
            Err(error) => {
                self.log = EventLog::new();
                self.last_event_time = None;
                return Err(error);
            }
        };

        self.log.restore(&entries, now);
        self.last_event_time = self.log.latest();
        self.log.trim(now, self.config.window_seconds());

        Ok(RestoreSummary {
            loaded: entries.len(),
            retained: self.log.len(),
            last_event_time: self.last_event_time,
        })
    }

    /// Runs one decision tick at `now`.
    pub fn run_single_iteration<S: EventStore>(
        &mut self,
        now: Timestamp,
        store: &mut S,
    ) -> Decision<S::Error> {
        self.log.trim(now, self.config.window_seconds());
        let average = MovingAverageEstimator::from_config(&self.config).estimate(&self.log);
        let (control, terms) = self.pid.update(average, self.config.setpoint);

        let fire = WindowGate::new(&self.config.watering_windows).contains(now)
            && DeadTimeGuard::new(self.config.deadtime_sec).is_clear(now, self.last_event_time)
            && control >= self.config.liters_per_event;

        let mut evicted = None;
        let mut store_error = None;
        if fire {
            if let RecordOutcome::Evicted(timestamp) = self.log.record(now) {
                evicted = Some(timestamp);
            }
            self.last_event_time = Some(now);
            self.pid.pullback(self.config.kidec);
            store_error = store.store(self.log.as_slice()).err();
        }

        let diagnostics = Diagnostics {
            average,
            control,
            terms,
            integral_error: self.pid.integral_error(),
        };
        self.last_diagnostics = Some(diagnostics);

        Decision {
            fire,
            diagnostics,
            store_error,
            evicted,
        }
    }

    /// Swaps in a new (validated) control config.
    ///
    /// History and PID state carry over; the integral is re-clamped against
    /// the new bound.
    pub fn replace_config(&mut self, config: ControlConfig) {
        self.pid.retune(&config);
        self.config = config;
    }

    #[must_use]
    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    #[must_use]
    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    #[must_use]
    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    #[must_use]
    pub fn last_event_time(&self) -> Option<Timestamp> {
        self.last_event_time
    }

    #[must_use]
    pub fn last_diagnostics(&self) -> Option<Diagnostics> {
        self.last_diagnostics
    }

    /// Current estimate without advancing the controller.
    #[must_use]
    pub fn estimate(&self) -> f64 {
        MovingAverageEstimator::from_config(&self.config).estimate(&self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{WateringWindow, WindowList};

    const MIDNIGHT: Timestamp = 19_676 * 86_400;

    struct FailingStore;

    impl EventStore for FailingStore {
        type Error = &'static str;

        fn load(&mut self) -> Result<EventHistory, Self::Error> {
            Err("corrupt")
        }

        fn store(&mut self, _events: &[Timestamp]) -> Result<(), Self::Error> {
            Err("flash busy")
        }
    }

    struct SeededStore(EventHistory);

    impl EventStore for SeededStore {
        type Error = Infallible;

        fn load(&mut self) -> Result<EventHistory, Self::Error> {
            Ok(self.0.clone())
        }

        fn store(&mut self, events: &[Timestamp]) -> Result<(), Self::Error> {
            self.0.clear();
            self.0.extend_from_slice(events).ok();
            Ok(())
        }
    }

    fn all_day_config() -> ControlConfig {
        let mut watering_windows = WindowList::new();
        watering_windows
            .push(WateringWindow::new(0, 86_399))
            .expect("window list has room");
        ControlConfig {
            watering_windows,
            ..ControlConfig::default()
        }
    }

    #[test]
    fn fires_when_the_log_is_empty_inside_a_window() {
        let mut scheduler = WateringScheduler::new(ControlConfig::default());
        let decision = scheduler.run_single_iteration(MIDNIGHT + 32_400, &mut NoopEventStore);

        assert!(decision.fire);
        assert_eq!(scheduler.event_log().len(), 1);
        assert_eq!(scheduler.last_event_time(), Some(MIDNIGHT + 32_400));
        assert!((decision.diagnostics.control - 4.0).abs() < 0.01);
    }

    #[test]
    fn stays_quiet_outside_windows() {
        let mut scheduler = WateringScheduler::new(ControlConfig::default());
        let decision = scheduler.run_single_iteration(MIDNIGHT + 3_600, &mut NoopEventStore);
        assert!(!decision.fire);
        assert!(scheduler.event_log().is_empty());
    }

    #[test]
    fn pullback_applies_only_on_fire() {
        let mut scheduler = WateringScheduler::new(all_day_config());
        let quiet = scheduler.run_single_iteration(MIDNIGHT, &mut NoopEventStore);
        assert!(quiet.fire);

        let after_fire = scheduler.pid().integral_error();
        // 4.0 accumulated, then 10 % of the 4000 bound pulled back.
        assert!((after_fire - (4.0 - 400.0)).abs() < 1e-9);
    }

    #[test]
    fn store_failure_is_reported_without_touching_the_log() {
        let mut scheduler = WateringScheduler::new(all_day_config());
        let decision = scheduler.run_single_iteration(MIDNIGHT, &mut FailingStore);
        assert!(decision.fire);
        assert_eq!(decision.store_error, Some("flash busy"));
        assert_eq!(scheduler.event_log().len(), 1);
    }

    #[test]
    fn load_failure_is_a_cold_start() {
        let mut scheduler = WateringScheduler::new(ControlConfig::default());
        assert_eq!(scheduler.restore(&mut FailingStore, MIDNIGHT), Err("corrupt"));
        assert!(scheduler.event_log().is_empty());
        assert_eq!(scheduler.last_event_time(), None);
    }

    #[test]
    fn restore_honours_dead_time_across_reboots() {
        let mut seeded = EventHistory::new();
        seeded.push(MIDNIGHT + 32_400).expect("room");
        let mut store = SeededStore(seeded);

        let mut scheduler = WateringScheduler::new(all_day_config());
        let summary = scheduler
            .restore(&mut store, MIDNIGHT + 32_700)
            .expect("infallible");
        assert_eq!(summary.retained, 1);
        assert_eq!(summary.last_event_time, Some(MIDNIGHT + 32_400));

        let decision = scheduler.run_single_iteration(MIDNIGHT + 32_700, &mut store);
        assert!(!decision.fire);
    }

    #[test]
    fn recorded_doses_are_persisted() {
        let mut store = SeededStore(EventHistory::new());
        let mut scheduler = WateringScheduler::new(all_day_config());
        scheduler.run_single_iteration(MIDNIGHT, &mut store);
        assert_eq!(store.0.as_slice(), &[MIDNIGHT]);
    }

    #[test]
    fn replace_config_keeps_history() {
        let mut scheduler = WateringScheduler::new(all_day_config());
        scheduler.run_single_iteration(MIDNIGHT, &mut NoopEventStore);

        let stricter = ControlConfig {
            ki: 0.0,
            ..all_day_config()
        };
        scheduler.replace_config(stricter);
        assert_eq!(scheduler.event_log().len(), 1);
        assert_eq!(scheduler.pid().integral_error(), 0.0);
        assert_eq!(scheduler.config().ki, 0.0);
    }
}

//! Owned controller context tying the scheduler, sequencer, inbox and
//! telemetry together.
//!
//! Platforms own one [`WateringController`] and call [`WateringController::tick`]
//! at a fixed cadence, passing the current time plus their actuator and
//! persistence collaborators. Config replacement goes through `&mut self`
//! between ticks, so a tick never observes a half-applied config.

use crate::Timestamp;
use crate::config::{ConfigError, ControlConfig, HardwareConfig, Validate, validated};
use crate::schedule::{
    Decision, Diagnostics, EventStore, RestoreSummary, WateringScheduler,
};
use crate::sequencer::{ActuationSequencer, ActuationState, Actuators, Completion};
use crate::telemetry::{DoseTelemetry, TelemetryEventKind, TelemetryPayload, TelemetryRecorder};
use crate::triggers::{InboxError, TriggerInbox, TriggerRequest, TriggerSource};

/// Everything that happened during one tick.
#[derive(Debug, PartialEq)]
pub struct TickReport<E> {
    pub decision: Decision<E>,
    /// Source of the request that started a cycle this tick.
    pub started: Option<TriggerSource>,
    pub completion: Option<Completion>,
    pub state: ActuationState,
}

/// Point-in-time view used by status commands.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub state: ActuationState,
    pub status_timestamp: Timestamp,
    pub watering_count: u32,
    pub events_in_window: usize,
    pub estimate: f64,
    pub integral_error: f64,
    pub last_event_time: Option<Timestamp>,
    pub diagnostics: Option<Diagnostics>,
    pub pending_triggers: usize,
}

/// Auto-watering controller context.
pub struct WateringController {
    scheduler: WateringScheduler,
    sequencer: ActuationSequencer,
    inbox: TriggerInbox,
    telemetry: TelemetryRecorder,
}

impl WateringController {
    /// Builds a controller from validated configs.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure of either config.
    pub fn new(control: ControlConfig, hardware: HardwareConfig) -> Result<Self, ConfigError> {
        let control = validated(control)?;
        let hardware = validated(hardware)?;
        Ok(Self {
            scheduler: WateringScheduler::new(control),
            sequencer: ActuationSequencer::new(hardware),
            inbox: TriggerInbox::new(),
            telemetry: TelemetryRecorder::new(),
        })
    }

    /// Forces the hardware into its resting state and seeds the event log.
    ///
    /// A persistence load failure degrades to a cold start and is reported
    /// through telemetry only.
    pub fn start<A, S>(
        &mut self,
        now: Timestamp,
        actuators: &mut A,
        store: &mut S,
    ) -> Option<RestoreSummary>
    where
        A: Actuators + ?Sized,
        S: EventStore,
    {
        self.sequencer.start(now, actuators, &mut self.telemetry);

        if let Ok(summary) = self.scheduler.restore(store, now) {
            self.telemetry.record(
                TelemetryEventKind::EventLogRestored,
                TelemetryPayload::Count(u16::try_from(summary.retained).unwrap_or(u16::MAX)),
                now,
            );
            Some(summary)
        } else {
            self.telemetry.record(
                TelemetryEventKind::PersistenceLoadFailed,
                TelemetryPayload::none(),
                now,
            );
            None
        }
    }

    /// Queues an external trigger for the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`InboxError::Full`] when the inbox cannot take another request.
    pub fn submit(&mut self, source: TriggerSource, now: Timestamp) -> Result<(), InboxError> {
        self.enqueue(TriggerRequest::new(source, now), now)
    }

    /// Runs one control tick.
    ///
    /// The scheduler decides first; a fired dose joins the inbox behind any
    /// pending external requests. The sequencer then checks the valve and
    /// advances its deadlines, and finally the inbox is drained into it.
    pub fn tick<A, S>(
        &mut self,
        now: Timestamp,
        actuators: &mut A,
        store: &mut S,
    ) -> TickReport<S::Error>
    where
        A: Actuators + ?Sized,
        S: EventStore,
    {
        let decision = self.scheduler.run_single_iteration(now, store);

        if let Some(evicted) = decision.evicted {
            self.telemetry.record(
                TelemetryEventKind::EventLogOverflow,
                TelemetryPayload::At(evicted),
                now,
            );
        }
        if decision.fire {
            self.telemetry.record(
                TelemetryEventKind::DoseScheduled,
                TelemetryPayload::Dose(DoseTelemetry::new(
                    &decision.diagnostics,
                    self.scheduler.event_log().len(),
                )),
                now,
            );
            // A full inbox is already recorded as a dropped trigger.
            let _ = self.enqueue(TriggerRequest::new(TriggerSource::Scheduler, now), now);
        }
        if decision.store_error.is_some() {
            self.telemetry.record(
                TelemetryEventKind::PersistenceStoreFailed,
                TelemetryPayload::none(),
                now,
            );
        }

        let completion = self.sequencer.poll(now, actuators, &mut self.telemetry);

        let mut started = None;
        while let Some(request) = self.inbox.pop() {
            if self
                .sequencer
                .trigger(request, now, actuators, &mut self.telemetry)
                .is_ok()
            {
                started = Some(request.source);
            }
        }

        TickReport {
            decision,
            started,
            completion,
            state: self.sequencer.state(),
        }
    }

    /// Replaces the control config if it validates.
    ///
    /// # Errors
    ///
    /// Returns the validation failure; the previous config stays active.
    pub fn apply_control(
        &mut self,
        candidate: ControlConfig,
        now: Timestamp,
    ) -> Result<(), ConfigError> {
        match validated(candidate) {
            Ok(config) => {
                self.scheduler.replace_config(config);
                self.record_applied::<ControlConfig>(now);
                Ok(())
            }
            Err(error) => Err(self.record_rejected::<ControlConfig>(error, now)),
        }
    }

    /// Replaces the hardware config if it validates. A running cycle keeps the
    /// timing it started with.
    ///
    /// # Errors
    ///
    /// Returns the validation failure; the previous config stays active.
    pub fn apply_hardware(
        &mut self,
        candidate: HardwareConfig,
        now: Timestamp,
    ) -> Result<(), ConfigError> {
        match validated(candidate) {
            Ok(config) => {
                self.sequencer.replace_hardware(config);
                self.record_applied::<HardwareConfig>(now);
                Ok(())
            }
            Err(error) => Err(self.record_rejected::<HardwareConfig>(error, now)),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.sequencer.state(),
            status_timestamp: self.sequencer.status_timestamp(),
            watering_count: self.sequencer.watering_count(),
            events_in_window: self.scheduler.event_log().len(),
            estimate: self.scheduler.estimate(),
            integral_error: self.scheduler.pid().integral_error(),
            last_event_time: self.scheduler.last_event_time(),
            diagnostics: self.scheduler.last_diagnostics(),
            pending_triggers: self.inbox.len(),
        }
    }

    #[must_use]
    pub fn control_config(&self) -> &ControlConfig {
        self.scheduler.config()
    }

    #[must_use]
    pub fn hardware_config(&self) -> &HardwareConfig {
        self.sequencer.hardware()
    }

    #[must_use]
    pub fn scheduler(&self) -> &WateringScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn sequencer(&self) -> &ActuationSequencer {
        &self.sequencer
    }

    #[must_use]
    pub fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    fn enqueue(&mut self, request: TriggerRequest, now: Timestamp) -> Result<(), InboxError> {
        self.inbox.push(request).inspect_err(|_| {
            self.telemetry.record(
                TelemetryEventKind::TriggerDropped(request.source),
                TelemetryPayload::none(),
                now,
            );
        })
    }

    fn record_applied<C: Validate>(&mut self, now: Timestamp) {
        self.telemetry.record(
            TelemetryEventKind::ConfigApplied(C::KIND),
            TelemetryPayload::none(),
            now,
        );
    }

    fn record_rejected<C: Validate>(&mut self, error: ConfigError, now: Timestamp) -> ConfigError {
        self.telemetry.record(
            TelemetryEventKind::ConfigRejected(C::KIND),
            TelemetryPayload::Rejected(error),
            now,
        );
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::NoopEventStore;
    use crate::sequencer::{PumpId, ValveCoils};

    #[derive(Default)]
    struct BenchActuators {
        coils: ValveCoils,
    }

    impl Actuators for BenchActuators {
        fn close_valve(&mut self) {
            self.coils = ValveCoils {
                open: false,
                close: true,
            };
        }

        fn open_valve(&mut self) {
            self.coils = ValveCoils {
                open: true,
                close: false,
            };
        }

        fn set_pump_duty(&mut self, _pump: PumpId, _percent: u8) {}

        fn valve_coils(&self) -> ValveCoils {
            self.coils
        }
    }

    const MIDNIGHT: Timestamp = 19_676 * 86_400;

    #[test]
    fn rejects_invalid_configs_at_construction() {
        let control = ControlConfig {
            liters_per_event: 0.0,
            ..ControlConfig::default()
        };
        assert_eq!(
            WateringController::new(control, HardwareConfig::default()).err(),
            Some(ConfigError::NotPositive("liters_per_event"))
        );
    }

    #[test]
    fn external_trigger_starts_on_next_tick() {
        let mut controller =
            WateringController::new(ControlConfig::default(), HardwareConfig::default())
                .expect("defaults are valid");
        let mut actuators = BenchActuators::default();
        let now = MIDNIGHT + 3_600;
        controller.start(now, &mut actuators, &mut NoopEventStore);

        controller
            .submit(TriggerSource::Button, now)
            .expect("inbox has room");
        let report = controller.tick(now + 1, &mut actuators, &mut NoopEventStore);
        assert_eq!(report.started, Some(TriggerSource::Button));
        assert_eq!(report.state, ActuationState::ValveClosing);
        assert!(!report.decision.fire);
    }

    #[test]
    fn rejected_config_leaves_previous_in_place() {
        let mut controller =
            WateringController::new(ControlConfig::default(), HardwareConfig::default())
                .expect("defaults are valid");
        let candidate = HardwareConfig {
            water_pump_duty_percent: 0,
            ..HardwareConfig::default()
        };

        assert!(controller.apply_hardware(candidate, 5).is_err());
        assert_eq!(controller.hardware_config(), &HardwareConfig::default());
        assert_eq!(
            controller.telemetry().latest().map(|record| record.event),
            Some(TelemetryEventKind::ConfigRejected(
                crate::config::ConfigKind::Hardware
            ))
        );
    }
}

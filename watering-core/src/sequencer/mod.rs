//! Actuation state machine for one watering cycle.
//!
//! A cycle closes the bistable valve, runs the water and nutrient pumps for
//! their own durations, then reopens the valve. Deadlines are compared against
//! the tick clock; nothing here sleeps. Every poll starts by reading the valve
//! coils back, and a conflicting readout aborts the cycle with the valve forced
//! closed.

mod dose;

use core::fmt;

pub use dose::{DosePlan, PumpRun, nutrients_run_time_s};

use crate::Timestamp;
use crate::config::HardwareConfig;
use crate::telemetry::{
    PumpTelemetry, SequenceTelemetry, TelemetryEventKind, TelemetryPayload, TelemetryRecorder,
};
use crate::triggers::TriggerRequest;

/// Dosing pumps driven by the sequencer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PumpId {
    Water,
    Nutrients,
}

impl fmt::Display for PumpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PumpId::Water => "water",
            PumpId::Nutrients => "nutrients",
        })
    }
}

/// Energized state of the valve's two coils.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ValveCoils {
    pub open: bool,
    pub close: bool,
}

impl ValveCoils {
    /// Both coils energized at once; the valve position is undefined.
    #[must_use]
    pub const fn is_conflicting(self) -> bool {
        self.open && self.close
    }

    /// Neither coil energized; the resting position is unknown.
    #[must_use]
    pub const fn is_released(self) -> bool {
        !self.open && !self.close
    }
}

/// Hardware abstraction for the valve and pumps.
///
/// Valve commands may start a coil dead-time inside the implementation; the
/// implementation must never energize both coils itself.
pub trait Actuators {
    fn close_valve(&mut self);

    fn open_valve(&mut self);

    /// Sets a pump duty cycle in percent; `0` stops the pump.
    fn set_pump_duty(&mut self, pump: PumpId, percent: u8);

    /// Reads back the coil drive state.
    fn valve_coils(&self) -> ValveCoils;
}

/// Actuation state of the current cycle.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ActuationState {
    #[default]
    Idle,
    ValveClosing,
    PumpsRunning,
    ValveOpening,
}

impl ActuationState {
    /// Encodes the state for compact status words.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            ActuationState::Idle => 0,
            ActuationState::ValveClosing => 1,
            ActuationState::PumpsRunning => 2,
            ActuationState::ValveOpening => 3,
        }
    }

    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(ActuationState::Idle),
            1 => Some(ActuationState::ValveClosing),
            2 => Some(ActuationState::PumpsRunning),
            3 => Some(ActuationState::ValveOpening),
            _ => None,
        }
    }
}

impl fmt::Display for ActuationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActuationState::Idle => "idle",
            ActuationState::ValveClosing => "valve-closing",
            ActuationState::PumpsRunning => "pumps-running",
            ActuationState::ValveOpening => "valve-opening",
        })
    }
}

/// Errors surfaced when requesting a cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequenceError {
    /// A cycle is already running; the request was ignored.
    Busy(ActuationState),
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceError::Busy(state) => write!(f, "watering cycle already running ({state})"),
        }
    }
}

/// How a cycle ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Completion {
    /// Valve reopened after both pumps stopped.
    Finished { watering_count: u32, started_at: Timestamp },
    /// Conflicting coil readout; the valve was forced closed.
    Faulted { interrupted: ActuationState },
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
struct PumpProgress {
    water_running: bool,
    nutrients_running: bool,
}

/// Valve and pump sequencer.
#[derive(Debug)]
pub struct ActuationSequencer {
    hardware: HardwareConfig,
    state: ActuationState,
    status_timestamp: Timestamp,
    cycle_started_at: Timestamp,
    watering_count: u32,
    plan: Option<DosePlan>,
    pumps: PumpProgress,
}

impl ActuationSequencer {
    #[must_use]
    pub fn new(hardware: HardwareConfig) -> Self {
        Self {
            hardware,
            state: ActuationState::Idle,
            status_timestamp: 0,
            cycle_started_at: 0,
            watering_count: 0,
            plan: None,
            pumps: PumpProgress::default(),
        }
    }

    /// Puts the hardware into its safe resting state: pumps off, valve closed.
    pub fn start<A, const C: usize>(
        &mut self,
        now: Timestamp,
        actuators: &mut A,
        telemetry: &mut TelemetryRecorder<C>,
    ) where
        A: Actuators + ?Sized,
    {
        actuators.set_pump_duty(PumpId::Water, 0);
        actuators.set_pump_duty(PumpId::Nutrients, 0);
        actuators.close_valve();
        self.enter_idle(now);
        telemetry.record(
            TelemetryEventKind::ValveForcedClosed,
            TelemetryPayload::none(),
            now,
        );
    }

    /// Replaces the hardware config used by the next cycle.
    pub fn replace_hardware(&mut self, hardware: HardwareConfig) {
        self.hardware = hardware;
    }

    /// Starts a cycle when idle; a running cycle is never preempted.
    ///
    /// Returns the new watering count.
    pub fn trigger<A, const C: usize>(
        &mut self,
        request: TriggerRequest,
        now: Timestamp,
        actuators: &mut A,
        telemetry: &mut TelemetryRecorder<C>,
    ) -> Result<u32, SequenceError>
    where
        A: Actuators + ?Sized,
    {
        if self.state != ActuationState::Idle {
            telemetry.record(
                TelemetryEventKind::TriggerIgnored(request.source),
                TelemetryPayload::none(),
                now,
            );
            return Err(SequenceError::Busy(self.state));
        }

        self.watering_count = self.watering_count.wrapping_add(1);
        self.cycle_started_at = now;
        self.plan = Some(DosePlan::from_config(&self.hardware));
        telemetry.record(
            TelemetryEventKind::TriggerAccepted(request.source),
            TelemetryPayload::At(request.requested_at),
            now,
        );

        actuators.close_valve();
        self.enter(ActuationState::ValveClosing, now);
        telemetry.record(
            TelemetryEventKind::ValveClosing,
            TelemetryPayload::none(),
            now,
        );
        Ok(self.watering_count)
    }

    /// Advances the cycle against `now`, cascading through every transition
    /// whose exit condition already holds.
    ///
    /// Conflicting coils fault the cycle. Released coils while idle drive the
    /// valve back to closed.
    pub fn poll<A, const C: usize>(
        &mut self,
        now: Timestamp,
        actuators: &mut A,
        telemetry: &mut TelemetryRecorder<C>,
    ) -> Option<Completion>
    where
        A: Actuators + ?Sized,
    {
        let coils = actuators.valve_coils();
        if coils.is_conflicting() {
            return Some(self.fault(now, actuators, telemetry));
        }
        if coils.is_released() && self.state == ActuationState::Idle {
            actuators.close_valve();
            telemetry.record(
                TelemetryEventKind::ValveForcedClosed,
                TelemetryPayload::none(),
                now,
            );
            return None;
        }

        let plan = self.plan?;
        loop {
            match self.state {
                ActuationState::Idle => return None,
                ActuationState::ValveClosing => {
                    if !self.elapsed(now, plan.valve_closing_s) {
                        return None;
                    }
                    actuators.set_pump_duty(PumpId::Water, plan.water.duty_percent);
                    actuators.set_pump_duty(PumpId::Nutrients, plan.nutrients.duty_percent);
                    self.pumps = PumpProgress {
                        water_running: true,
                        nutrients_running: true,
                    };
                    self.enter(ActuationState::PumpsRunning, now);
                    telemetry.record(
                        TelemetryEventKind::PumpsStarted,
                        TelemetryPayload::Pumps(PumpTelemetry {
                            water_duty_percent: plan.water.duty_percent,
                            water_run_s: plan.water.run_time_s,
                            nutrients_duty_percent: plan.nutrients.duty_percent,
                            nutrients_run_s: plan.nutrients.run_time_s,
                        }),
                        now,
                    );
                }
                ActuationState::PumpsRunning => {
                    if self.pumps.water_running && self.elapsed(now, plan.water.run_time_s) {
                        self.stop_pump(PumpId::Water, now, actuators, telemetry);
                    }
                    if self.pumps.nutrients_running
                        && self.elapsed(now, plan.nutrients.run_time_s)
                    {
                        self.stop_pump(PumpId::Nutrients, now, actuators, telemetry);
                    }
                    if self.pumps.water_running || self.pumps.nutrients_running {
                        return None;
                    }
                    actuators.open_valve();
                    self.enter(ActuationState::ValveOpening, now);
                    telemetry.record(
                        TelemetryEventKind::ValveOpened,
                        TelemetryPayload::none(),
                        now,
                    );
                }
                ActuationState::ValveOpening => {
                    let completion = Completion::Finished {
                        watering_count: self.watering_count,
                        started_at: self.cycle_started_at,
                    };
                    telemetry.record(
                        TelemetryEventKind::SequenceComplete,
                        TelemetryPayload::Sequence(self.summary(now, ActuationState::ValveOpening)),
                        now,
                    );
                    self.enter_idle(now);
                    return Some(completion);
                }
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> ActuationState {
        self.state
    }

    /// Tick time at which the current state was entered.
    #[must_use]
    pub fn status_timestamp(&self) -> Timestamp {
        self.status_timestamp
    }

    #[must_use]
    pub fn watering_count(&self) -> u32 {
        self.watering_count
    }

    #[must_use]
    pub fn hardware(&self) -> &HardwareConfig {
        &self.hardware
    }

    /// Plan of the running cycle, if any.
    #[must_use]
    pub fn plan(&self) -> Option<&DosePlan> {
        self.plan.as_ref()
    }

    /// Whether each pump is still running, as `(water, nutrients)`.
    #[must_use]
    pub fn pumps_running(&self) -> (bool, bool) {
        (self.pumps.water_running, self.pumps.nutrients_running)
    }

    fn fault<A, const C: usize>(
        &mut self,
        now: Timestamp,
        actuators: &mut A,
        telemetry: &mut TelemetryRecorder<C>,
    ) -> Completion
    where
        A: Actuators + ?Sized,
    {
        let interrupted = self.state;
        actuators.set_pump_duty(PumpId::Water, 0);
        actuators.set_pump_duty(PumpId::Nutrients, 0);
        actuators.close_valve();
        telemetry.record(
            TelemetryEventKind::ValveFault,
            TelemetryPayload::Sequence(self.summary(now, interrupted)),
            now,
        );
        self.enter_idle(now);
        Completion::Faulted { interrupted }
    }

    fn stop_pump<A, const C: usize>(
        &mut self,
        pump: PumpId,
        now: Timestamp,
        actuators: &mut A,
        telemetry: &mut TelemetryRecorder<C>,
    ) where
        A: Actuators + ?Sized,
    {
        actuators.set_pump_duty(pump, 0);
        match pump {
            PumpId::Water => self.pumps.water_running = false,
            PumpId::Nutrients => self.pumps.nutrients_running = false,
        }
        telemetry.record(
            TelemetryEventKind::PumpStopped(pump),
            TelemetryPayload::none(),
            now,
        );
    }

    fn summary(&self, now: Timestamp, ended_in: ActuationState) -> SequenceTelemetry {
        SequenceTelemetry {
            watering_count: self.watering_count,
            duration_s: now.saturating_sub(self.cycle_started_at),
            ended_in,
        }
    }

    fn elapsed(&self, now: Timestamp, seconds: u32) -> bool {
        now >= self.status_timestamp.saturating_add(u64::from(seconds))
    }

    fn enter(&mut self, state: ActuationState, now: Timestamp) {
        self.state = state;
        self.status_timestamp = now;
    }

    fn enter_idle(&mut self, now: Timestamp) {
        self.enter(ActuationState::Idle, now);
        self.plan = None;
        self.pumps = PumpProgress::default();
    }
}

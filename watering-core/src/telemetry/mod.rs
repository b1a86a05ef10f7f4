//! Telemetry event catalog and the ring buffer shared by firmware and host targets.
//!
//! Every notable controller action lands here as a [`TelemetryRecord`]. The
//! firmware mirrors fresh records to `defmt`, the simulator prints them, and
//! both read the same bounded history for the console `log` command.

use core::fmt;

use heapless::HistoryBuf;

use crate::Timestamp;
use crate::config::{ConfigError, ConfigKind};
use crate::schedule::Diagnostics;
use crate::sequencer::{ActuationState, PumpId};
use crate::triggers::TriggerSource;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Monotonic identifier assigned to each record.
pub type EventId = u32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    TriggerAccepted(TriggerSource),
    TriggerIgnored(TriggerSource),
    TriggerDropped(TriggerSource),
    DoseScheduled,
    ValveClosing,
    PumpsStarted,
    PumpStopped(PumpId),
    ValveOpened,
    SequenceComplete,
    ValveFault,
    ValveForcedClosed,
    EventLogOverflow,
    EventLogRestored,
    PersistenceLoadFailed,
    PersistenceStoreFailed,
    ConfigApplied(ConfigKind),
    ConfigRejected(ConfigKind),
}

/// Severity used when mirroring records to a log sink.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum TelemetryLevel {
    Info,
    Warn,
    Error,
}

impl TelemetryEventKind {
    #[must_use]
    pub const fn level(self) -> TelemetryLevel {
        match self {
            TelemetryEventKind::ValveFault => TelemetryLevel::Error,
            TelemetryEventKind::TriggerIgnored(_)
            | TelemetryEventKind::TriggerDropped(_)
            | TelemetryEventKind::EventLogOverflow
            | TelemetryEventKind::PersistenceLoadFailed
            | TelemetryEventKind::PersistenceStoreFailed
            | TelemetryEventKind::ConfigRejected(_) => TelemetryLevel::Warn,
            _ => TelemetryLevel::Info,
        }
    }
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::TriggerAccepted(source) => write!(f, "trigger-accepted {source}"),
            TelemetryEventKind::TriggerIgnored(source) => write!(f, "trigger-ignored {source}"),
            TelemetryEventKind::TriggerDropped(source) => write!(f, "trigger-dropped {source}"),
            TelemetryEventKind::DoseScheduled => f.write_str("dose-scheduled"),
            TelemetryEventKind::ValveClosing => f.write_str("valve-closing"),
            TelemetryEventKind::PumpsStarted => f.write_str("pumps-started"),
            TelemetryEventKind::PumpStopped(pump) => write!(f, "pump-stopped {pump}"),
            TelemetryEventKind::ValveOpened => f.write_str("valve-opened"),
            TelemetryEventKind::SequenceComplete => f.write_str("sequence-complete"),
            TelemetryEventKind::ValveFault => f.write_str("valve-fault"),
            TelemetryEventKind::ValveForcedClosed => f.write_str("valve-forced-closed"),
            TelemetryEventKind::EventLogOverflow => f.write_str("event-log-overflow"),
            TelemetryEventKind::EventLogRestored => f.write_str("event-log-restored"),
            TelemetryEventKind::PersistenceLoadFailed => f.write_str("persistence-load-failed"),
            TelemetryEventKind::PersistenceStoreFailed => f.write_str("persistence-store-failed"),
            TelemetryEventKind::ConfigApplied(kind) => write!(f, "config-applied {kind}"),
            TelemetryEventKind::ConfigRejected(kind) => write!(f, "config-rejected {kind}"),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Scheduler state at the moment a dose fired.
    Dose(DoseTelemetry),
    /// Duty cycles and planned run times for both pumps.
    Pumps(PumpTelemetry),
    /// Summary of a finished or interrupted watering cycle.
    Sequence(SequenceTelemetry),
    /// Timestamp associated with the event (evicted entry, newest restored dose).
    At(Timestamp),
    /// Number of entries involved.
    Count(u16),
    /// Validation failure behind a rejected config.
    Rejected(ConfigError),
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

impl fmt::Display for TelemetryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryPayload::None => Ok(()),
            TelemetryPayload::Dose(dose) => write!(
                f,
                "avg={:.3} control={:.3} integral={:.1} events={}",
                dose.average, dose.control, dose.integral_error, dose.events_in_window
            ),
            TelemetryPayload::Pumps(pumps) => write!(
                f,
                "water={}%/{}s nutrients={}%/{}s",
                pumps.water_duty_percent,
                pumps.water_run_s,
                pumps.nutrients_duty_percent,
                pumps.nutrients_run_s
            ),
            TelemetryPayload::Sequence(sequence) => write!(
                f,
                "count={} duration={}s ended-in={}",
                sequence.watering_count, sequence.duration_s, sequence.ended_in
            ),
            TelemetryPayload::At(timestamp) => write!(f, "at={timestamp}"),
            TelemetryPayload::Count(count) => write!(f, "count={count}"),
            TelemetryPayload::Rejected(error) => write!(f, "{error}"),
        }
    }
}

/// Scheduler snapshot captured when a dose fires.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DoseTelemetry {
    pub average: f64,
    pub control: f64,
    pub integral_error: f64,
    pub events_in_window: u16,
}

impl DoseTelemetry {
    #[must_use]
    pub fn new(diagnostics: &Diagnostics, events_in_window: usize) -> Self {
        Self {
            average: diagnostics.average,
            control: diagnostics.control,
            integral_error: diagnostics.integral_error,
            events_in_window: truncate_count(events_in_window),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PumpTelemetry {
    pub water_duty_percent: u8,
    pub water_run_s: u32,
    pub nutrients_duty_percent: u8,
    pub nutrients_run_s: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SequenceTelemetry {
    pub watering_count: u32,
    pub duration_s: u64,
    /// State the sequencer was in when the cycle ended.
    pub ended_in: ActuationState,
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} t={} {}", self.id, self.timestamp, self.event)?;
        if !matches!(self.details, TelemetryPayload::None) {
            write!(f, " {}", self.details)?;
        }
        Ok(())
    }
}

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        details: TelemetryPayload,
        timestamp: Timestamp,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details,
        });

        id
    }

    /// Returns the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.ring.oldest_ordered()
    }

    /// Records with an id at or after `cursor`, oldest first.
    ///
    /// Sinks keep the id following the last record they emitted and pass it
    /// back here to pick up only new entries.
    pub fn since(&self, cursor: EventId) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.oldest_first().filter(move |record| record.id >= cursor)
    }

    /// Returns the most recent telemetry record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Id the next record will receive.
    #[must_use]
    pub fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_count(count: usize) -> u16 {
    u16::try_from(count).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_and_ring_keeps_newest() {
        let mut recorder: TelemetryRecorder<2> = TelemetryRecorder::new();
        recorder.record(TelemetryEventKind::ValveClosing, TelemetryPayload::none(), 1);
        recorder.record(TelemetryEventKind::PumpsStarted, TelemetryPayload::none(), 2);
        let last = recorder.record(TelemetryEventKind::ValveOpened, TelemetryPayload::none(), 3);

        assert_eq!(last, 2);
        assert_eq!(recorder.len(), 2);
        let events: heapless::Vec<_, 2> = recorder.oldest_first().map(|r| r.event).collect();
        assert_eq!(
            events.as_slice(),
            &[TelemetryEventKind::PumpsStarted, TelemetryEventKind::ValveOpened]
        );
    }

    #[test]
    fn since_skips_already_emitted_records() {
        let mut recorder: TelemetryRecorder = TelemetryRecorder::new();
        recorder.record(TelemetryEventKind::DoseScheduled, TelemetryPayload::none(), 10);
        let cursor = recorder.next_event_id();
        recorder.record(
            TelemetryEventKind::TriggerAccepted(TriggerSource::Scheduler),
            TelemetryPayload::none(),
            10,
        );

        assert_eq!(recorder.since(cursor).count(), 1);
        assert_eq!(recorder.since(0).count(), 2);
    }

    #[test]
    fn severity_flags_faults_and_rejections() {
        assert_eq!(TelemetryEventKind::ValveFault.level(), TelemetryLevel::Error);
        assert_eq!(
            TelemetryEventKind::ConfigRejected(ConfigKind::Hardware).level(),
            TelemetryLevel::Warn
        );
        assert_eq!(TelemetryEventKind::PumpsStarted.level(), TelemetryLevel::Info);
    }

    #[test]
    fn records_render_event_and_payload() {
        let record = TelemetryRecord {
            id: 7,
            timestamp: 42,
            event: TelemetryEventKind::PumpStopped(PumpId::Nutrients),
            details: TelemetryPayload::At(58),
        };
        let mut text: heapless::String<64> = heapless::String::new();
        core::fmt::write(&mut text, format_args!("{record}")).expect("fits");
        assert_eq!(text.as_str(), "#7 t=42 pump-stopped nutrients at=58");
    }
}

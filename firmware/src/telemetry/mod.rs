//! Log sink for controller telemetry.
//!
//! The controller keeps its own bounded history; this module forwards each
//! record once to defmt on target (stdout on the host) at the record's
//! severity.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use watering_core::telemetry::{EventId, TelemetryLevel, TelemetryRecord, TelemetryRecorder};

/// Forwards records that appeared since the previous flush.
#[derive(Debug, Default)]
pub struct TelemetryMirror {
    cursor: EventId,
}

impl TelemetryMirror {
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Emits every record newer than the cursor and returns how many were
    /// forwarded.
    pub fn flush<const C: usize>(&mut self, recorder: &TelemetryRecorder<C>) -> usize {
        let mut forwarded = 0;
        for record in recorder.since(self.cursor) {
            emit(record);
            forwarded += 1;
        }
        self.cursor = recorder.next_event_id();
        forwarded
    }

    pub fn cursor(&self) -> EventId {
        self.cursor
    }
}

#[cfg(target_os = "none")]
fn emit(record: &TelemetryRecord) {
    let line = defmt::Display2Format(record);
    match record.event.level() {
        TelemetryLevel::Info => defmt::info!("telemetry {}", line),
        TelemetryLevel::Warn => defmt::warn!("telemetry {}", line),
        TelemetryLevel::Error => defmt::error!("telemetry {}", line),
    }
}

#[cfg(not(target_os = "none"))]
fn emit(record: &TelemetryRecord) {
    let level = match record.event.level() {
        TelemetryLevel::Info => "INFO",
        TelemetryLevel::Warn => "WARN",
        TelemetryLevel::Error => "ERROR",
    };
    println!("{level} telemetry {record}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use watering_core::telemetry::{TelemetryEventKind, TelemetryPayload};

    #[test]
    fn each_record_is_forwarded_once() {
        let mut recorder: TelemetryRecorder = TelemetryRecorder::new();
        let mut mirror = TelemetryMirror::new();

        recorder.record(TelemetryEventKind::ValveForcedClosed, TelemetryPayload::None, 10);
        recorder.record(TelemetryEventKind::EventLogRestored, TelemetryPayload::Count(0), 10);
        assert_eq!(mirror.flush(&recorder), 2);
        assert_eq!(mirror.flush(&recorder), 0);

        recorder.record(TelemetryEventKind::ValveFault, TelemetryPayload::None, 11);
        assert_eq!(mirror.flush(&recorder), 1);
        assert_eq!(mirror.cursor(), 3);
    }
}

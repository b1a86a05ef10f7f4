//! Trailing history of dose timestamps and the volume estimate derived from it.

use heapless::Vec;

use crate::Timestamp;
use crate::config::ControlConfig;

/// Maximum number of doses retained in the trailing window.
pub const EVENT_LOG_CAPACITY: usize = 256;

/// Backing storage for the event log; also the shape persisted logs load into.
pub type EventHistory = Vec<Timestamp, EVENT_LOG_CAPACITY>;

/// Result of appending a dose to the log.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RecordOutcome {
    Appended,
    /// The log was full; the oldest entry was dropped to make room.
    Evicted(Timestamp),
}

/// Non-decreasing list of dose timestamps inside the trailing window.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventLog {
    entries: EventHistory,
}

impl EventLog {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Removes every entry at or before `now - window_seconds`.
    ///
    /// Returns the number of entries removed.
    #[allow(clippy::cast_precision_loss)]
    pub fn trim(&mut self, now: Timestamp, window_seconds: f64) -> usize {
        let cutoff = now as f64 - window_seconds;
        let before = self.entries.len();
        self.entries.retain(|&timestamp| timestamp as f64 > cutoff);
        before - self.entries.len()
    }

    /// Appends a dose recorded at `now`.
    pub fn record(&mut self, now: Timestamp) -> RecordOutcome {
        match self.entries.push(now) {
            Ok(()) => RecordOutcome::Appended,
            Err(_) => {
                let evicted = self.entries.remove(0);
                // Room was just made by the removal above.
                let _ = self.entries.push(now);
                RecordOutcome::Evicted(evicted)
            }
        }
    }

    /// Replaces the contents with `entries`, keeping only a non-decreasing run
    /// of timestamps no later than `now`.
    ///
    /// Returns the number of entries kept.
    pub fn restore(&mut self, entries: &[Timestamp], now: Timestamp) -> usize {
        self.entries.clear();
        for &timestamp in entries {
            if timestamp > now {
                continue;
            }
            if let Some(&latest) = self.entries.last()
                && timestamp < latest
            {
                continue;
            }
            if self.entries.push(timestamp).is_err() {
                break;
            }
        }
        self.entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent dose, if any.
    #[must_use]
    pub fn latest(&self) -> Option<Timestamp> {
        self.entries.last().copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Timestamp] {
        &self.entries
    }
}

/// Daily volume estimate: every logged dose counts at full weight until it
/// ages out of the trailing window.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MovingAverageEstimator {
    liters_per_event: f64,
    time_window_days: f64,
}

impl MovingAverageEstimator {
    #[must_use]
    pub const fn new(liters_per_event: f64, time_window_days: f64) -> Self {
        Self {
            liters_per_event,
            time_window_days,
        }
    }

    #[must_use]
    pub const fn from_config(config: &ControlConfig) -> Self {
        Self::new(config.liters_per_event, config.time_window_days)
    }

    /// Liters per day implied by the (already trimmed) log.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn estimate(&self, log: &EventLog) -> f64 {
        log.len() as f64 * self.liters_per_event / self.time_window_days
    }
}

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! The control task publishes the actuation state and counters into atomics
//! after every tick so the console task can print a heartbeat line without
//! locking the controller.

use core::fmt;

use portable_atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};
use watering_core::Timestamp;
use watering_core::controller::StatusSnapshot;
use watering_core::sequencer::ActuationState;

/// Sentinel for "no watering since boot".
const NEVER: u64 = u64::MAX;

/// Offset added to uptime seconds to obtain wall-clock seconds.
static WALL_CLOCK_BASE: AtomicU64 = AtomicU64::new(0);
/// Raw [`ActuationState`] published by the control task.
static STATE: AtomicU8 = AtomicU8::new(0);
/// Cycles started since boot.
static WATERING_COUNT: AtomicU32 = AtomicU32::new(0);
/// Uptime seconds of the most recent cycle start.
static LAST_WATERING_UPTIME: AtomicU64 = AtomicU64::new(NEVER);

/// Aligns the wall clock so that `uptime_s` corresponds to `epoch_s`.
pub fn set_wall_clock(epoch_s: Timestamp, uptime_s: u64) {
    WALL_CLOCK_BASE.store(epoch_s.saturating_sub(uptime_s), Ordering::Relaxed);
}

/// Converts uptime seconds into wall-clock seconds.
pub fn wall_clock(uptime_s: u64) -> Timestamp {
    WALL_CLOCK_BASE
        .load(Ordering::Relaxed)
        .saturating_add(uptime_s)
}

/// Publishes the controller state after a tick.
pub fn record_tick(snapshot: &StatusSnapshot, cycle_started: bool, uptime_s: u64) {
    STATE.store(snapshot.state.to_raw(), Ordering::Relaxed);
    WATERING_COUNT.store(snapshot.watering_count, Ordering::Relaxed);
    if cycle_started {
        LAST_WATERING_UPTIME.store(uptime_s, Ordering::Relaxed);
    }
}

pub fn state() -> ActuationState {
    ActuationState::from_raw(STATE.load(Ordering::Relaxed)).unwrap_or_default()
}

pub fn watering_count() -> u32 {
    WATERING_COUNT.load(Ordering::Relaxed)
}

pub fn last_watering_uptime() -> Option<u64> {
    match LAST_WATERING_UPTIME.load(Ordering::Relaxed) {
        NEVER => None,
        uptime => Some(uptime),
    }
}

/// Writes the periodic status line.
pub fn render_heartbeat(uptime_s: u64, out: &mut impl fmt::Write) -> fmt::Result {
    write!(out, "uptime={uptime_s:05} last-watering=")?;
    match last_watering_uptime() {
        Some(uptime) => write!(out, "{uptime:05}")?,
        None => out.write_str("never")?,
    }
    write!(
        out,
        " waterings={:03} state={} clock={}",
        watering_count(),
        state(),
        wall_clock(uptime_s)
    )
}

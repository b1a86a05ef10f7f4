#![no_std]

// Shared logic for the auto-watering controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Collaborators (actuators, persistence, the wall clock)
// are reached through traits so the firmware and simulator can plug in their own.

pub mod config;
pub mod console;
pub mod controller;
pub mod schedule;
pub mod sequencer;
pub mod telemetry;
pub mod triggers;

/// Wall-clock seconds since the epoch, already shifted to local time by the
/// time source.
pub type Timestamp = u64;

/// Number of seconds in one day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Returns the second of the day for `now`.
#[must_use]
pub const fn second_of_day(now: Timestamp) -> u32 {
    // The remainder is always below 86 400 and therefore fits.
    #[allow(clippy::cast_possible_truncation)]
    let seconds = (now % SECONDS_PER_DAY) as u32;
    seconds
}

//! Field-level edits applied to a configuration copy.
//!
//! Operators change one or more fields at a time (`kp=0.8 ki=0.002`). Each
//! assignment is written into a scratch copy of the active config; the copy is
//! validated and swapped in only after every assignment succeeded, so a bad
//! value never leaves a half-edited config behind.

use core::fmt;
use core::str::FromStr;

use super::{ConfigKind, ControlConfig, HardwareConfig};

/// Field names accepted for [`ControlConfig`].
pub const CONTROL_KEYS: &[&str] = &[
    "setpoint",
    "liters_per_event",
    "deadtime_sec",
    "time_window_days",
    "kp",
    "ki",
    "kd",
    "kimax",
    "kidec",
];

/// Field names accepted for [`HardwareConfig`].
pub const HARDWARE_KEYS: &[&str] = &[
    "water_pump_time_s",
    "water_pump_duty_percent",
    "nutrients_pump_volume_ml",
    "nutrients_pump_duty_percent",
    "valve_closing_time_s",
    "nutrient_flow_ml_per_sec",
];

/// Failure to apply a single assignment.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PatchError<'a> {
    UnknownKey { kind: ConfigKind, key: &'a str },
    InvalidValue { key: &'a str, value: &'a str },
}

impl fmt::Display for PatchError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchError::UnknownKey { kind, key } => write!(f, "unknown {kind} key `{key}`"),
            PatchError::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for `{key}`")
            }
        }
    }
}

fn parse<'a, T: FromStr>(key: &'a str, value: &'a str) -> Result<T, PatchError<'a>> {
    value
        .parse::<T>()
        .map_err(|_| PatchError::InvalidValue { key, value })
}

/// Writes `key=value` into a control config.
pub fn apply_control<'a>(
    config: &mut ControlConfig,
    key: &'a str,
    value: &'a str,
) -> Result<(), PatchError<'a>> {
    match key {
        "setpoint" => config.setpoint = parse(key, value)?,
        "liters_per_event" => config.liters_per_event = parse(key, value)?,
        "deadtime_sec" => config.deadtime_sec = parse(key, value)?,
        "time_window_days" => config.time_window_days = parse(key, value)?,
        "kp" => config.kp = parse(key, value)?,
        "ki" => config.ki = parse(key, value)?,
        "kd" => config.kd = parse(key, value)?,
        "kimax" => config.kimax = parse(key, value)?,
        "kidec" => config.kidec = parse(key, value)?,
        _ => {
            return Err(PatchError::UnknownKey {
                kind: ConfigKind::Control,
                key,
            });
        }
    }
    Ok(())
}

/// Writes `key=value` into a hardware config.
pub fn apply_hardware<'a>(
    config: &mut HardwareConfig,
    key: &'a str,
    value: &'a str,
) -> Result<(), PatchError<'a>> {
    match key {
        "water_pump_time_s" => config.water_pump_time_s = parse(key, value)?,
        "water_pump_duty_percent" => config.water_pump_duty_percent = parse(key, value)?,
        "nutrients_pump_volume_ml" => config.nutrients_pump_volume_ml = parse(key, value)?,
        "nutrients_pump_duty_percent" => {
            config.nutrients_pump_duty_percent = parse(key, value)?;
        }
        "valve_closing_time_s" => config.valve_closing_time_s = parse(key, value)?,
        "nutrient_flow_ml_per_sec" => config.nutrient_flow_ml_per_sec = parse(key, value)?,
        _ => {
            return Err(PatchError::UnknownKey {
                kind: ConfigKind::Hardware,
                key,
            });
        }
    }
    Ok(())
}

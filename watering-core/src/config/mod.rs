//! Controller configuration shared by firmware and host targets.
//!
//! Two kinds of configuration exist: [`ControlConfig`] feeds the watering
//! scheduler and [`HardwareConfig`] describes how a single dose is delivered.
//! Both are validated through [`Validate`] before they reach the control loop,
//! and both are replaced wholesale; nothing in the core mutates a live config
//! field by field.

use core::fmt;

use heapless::Vec;

use crate::SECONDS_PER_DAY;
use crate::schedule::EVENT_LOG_CAPACITY;

pub mod patch;

/// Maximum number of daily watering windows.
pub const MAX_WATERING_WINDOWS: usize = 8;

/// Nutrient pump flow at 100 % duty on the reference board (ml/s).
pub const DEFAULT_NUTRIENT_FLOW_ML_PER_SEC: f64 = 1.58;

/// Daily time-of-day interval during which dosing is permitted.
///
/// Both bounds are seconds since midnight and inclusive.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WateringWindow {
    pub start: u32,
    pub end: u32,
}

impl WateringWindow {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Builds a window from wall-clock hours and minutes.
    pub const fn from_clock(start_hour: u32, start_minute: u32, end_hour: u32, end_minute: u32) -> Self {
        Self::new(
            start_hour * 3_600 + start_minute * 60,
            end_hour * 3_600 + end_minute * 60,
        )
    }

    /// Returns `true` when `second_of_day` falls inside the window.
    #[must_use]
    pub const fn contains(&self, second_of_day: u32) -> bool {
        self.start <= second_of_day && second_of_day <= self.end
    }

    /// Length of the window in seconds.
    #[must_use]
    pub const fn length(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

impl fmt::Display for WateringWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_clock(f, self.start)?;
        f.write_str("-")?;
        write_clock(f, self.end)
    }
}

fn write_clock(f: &mut fmt::Formatter<'_>, second_of_day: u32) -> fmt::Result {
    let hours = second_of_day / 3_600;
    let minutes = (second_of_day % 3_600) / 60;
    let seconds = second_of_day % 60;
    if seconds == 0 {
        write!(f, "{hours:02}:{minutes:02}")
    } else {
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
    }
}

/// Ordered list of watering windows.
pub type WindowList = Vec<WateringWindow, MAX_WATERING_WINDOWS>;

/// Which configuration document a value belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigKind {
    Control,
    Hardware,
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigKind::Control => f.write_str("control"),
            ConfigKind::Hardware => f.write_str("hw"),
        }
    }
}

/// Scheduler tuning: target volume, dosing cadence and PID gains.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlConfig {
    /// Target volume per day (liters).
    pub setpoint: f64,
    /// Volume delivered by a single dose (liters).
    pub liters_per_event: f64,
    /// Minimum spacing between two doses.
    pub deadtime_sec: u32,
    /// Length of the trailing averaging window; may be fractional.
    pub time_window_days: f64,
    pub watering_windows: WindowList,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Integral clamp expressed as a multiple of `liters_per_event`.
    pub kimax: f64,
    /// Fraction of the integral clamp removed after every dose.
    pub kidec: f64,
}

impl ControlConfig {
    /// Absolute bound applied to the accumulated integral error.
    ///
    /// A zero `ki` disables the integral path entirely, so the bound collapses
    /// to zero instead of dividing by zero.
    #[must_use]
    pub fn integral_max(&self) -> f64 {
        if self.ki > 0.0 {
            self.kimax * self.liters_per_event / self.ki
        } else {
            0.0
        }
    }

    /// Length of the trailing window in seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn window_seconds(&self) -> f64 {
        self.time_window_days * SECONDS_PER_DAY as f64
    }

    /// Upper bound on how many doses can sit inside the trailing window.
    ///
    /// Every window admits one dose at its start plus one per full dead-time
    /// that fits after it; a fractional trailing window can touch one more
    /// calendar day than its length suggests. Saturates at `usize::MAX`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn worst_case_events(&self) -> usize {
        let deadtime = self.deadtime_sec.max(1);
        let per_day: usize = self
            .watering_windows
            .iter()
            .map(|window| (window.length() / deadtime) as usize + 1)
            .sum();
        // Float math so absurd window lengths saturate instead of wrapping.
        // `f64::ceil` is std-only; the saturating cast gives the same ceiling.
        let whole = self.time_window_days as u64 as f64;
        let days = if whole < self.time_window_days {
            whole + 2.0
        } else {
            whole + 1.0
        };
        (per_day as f64 * days) as usize
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        let mut watering_windows = WindowList::new();
        // Two windows fit comfortably within MAX_WATERING_WINDOWS.
        let _ = watering_windows.push(WateringWindow::from_clock(9, 0, 9, 15));
        let _ = watering_windows.push(WateringWindow::from_clock(19, 0, 21, 0));

        Self {
            setpoint: 4.0,
            liters_per_event: 4.0,
            deadtime_sec: 600,
            time_window_days: 1.0,
            watering_windows,
            kp: 1.0,
            ki: 0.001,
            kd: 0.0,
            kimax: 1.0,
            kidec: 0.1,
        }
    }
}

/// Dose delivery timing for the valve and both pumps.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HardwareConfig {
    pub water_pump_time_s: u32,
    pub water_pump_duty_percent: u8,
    pub nutrients_pump_volume_ml: f64,
    pub nutrients_pump_duty_percent: u8,
    pub valve_closing_time_s: u32,
    /// Calibrated nutrient pump flow at 100 % duty.
    pub nutrient_flow_ml_per_sec: f64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            water_pump_time_s: 40,
            water_pump_duty_percent: 100,
            nutrients_pump_volume_ml: 25.0,
            nutrients_pump_duty_percent: 100,
            valve_closing_time_s: 5,
            nutrient_flow_ml_per_sec: DEFAULT_NUTRIENT_FLOW_ML_PER_SEC,
        }
    }
}

/// Reasons a configuration candidate is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// Field must be strictly positive (and finite).
    NotPositive(&'static str),
    /// Field must be zero or positive (and finite).
    Negative(&'static str),
    /// Field falls outside its documented range.
    OutOfRange(&'static str),
    /// Window bound lies outside a single day.
    WindowOutOfDay(usize),
    /// Window ends before it starts.
    WindowInverted(usize),
    /// Window starts before the previous one ends.
    WindowsOverlap(usize),
    /// Worst-case event count exceeds the event log capacity.
    EventLogCapacity { required: usize, capacity: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotPositive(field) => write!(f, "{field} must be greater than zero"),
            ConfigError::Negative(field) => write!(f, "{field} must not be negative"),
            ConfigError::OutOfRange(field) => write!(f, "{field} is out of range"),
            ConfigError::WindowOutOfDay(index) => {
                write!(f, "watering window {index} is outside the day")
            }
            ConfigError::WindowInverted(index) => {
                write!(f, "watering window {index} ends before it starts")
            }
            ConfigError::WindowsOverlap(index) => {
                write!(f, "watering window {index} overlaps the previous window")
            }
            ConfigError::EventLogCapacity { required, capacity } => write!(
                f,
                "config allows {required} events per window but the log holds {capacity}"
            ),
        }
    }
}

/// Validation hook implemented by every configuration kind.
pub trait Validate {
    /// Identifies the configuration document.
    const KIND: ConfigKind;

    /// Checks every field, returning the first violation.
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Validates a candidate and hands it back for wholesale replacement.
pub fn validated<C: Validate>(candidate: C) -> Result<C, ConfigError> {
    candidate.validate()?;
    Ok(candidate)
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotPositive(field))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Negative(field))
    }
}

fn duty(field: &'static str, value: u8) -> Result<(), ConfigError> {
    if (1..=100).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange(field))
    }
}

fn nonzero(field: &'static str, value: u32) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive(field))
    }
}

/// Checks that windows lie within the day, are ordered and never overlap.
pub fn validate_windows(windows: &[WateringWindow]) -> Result<(), ConfigError> {
    let day = u32::try_from(SECONDS_PER_DAY).unwrap_or(u32::MAX);
    let mut previous_end: Option<u32> = None;
    for (index, window) in windows.iter().enumerate() {
        if window.start >= day || window.end >= day {
            return Err(ConfigError::WindowOutOfDay(index));
        }
        if window.end < window.start {
            return Err(ConfigError::WindowInverted(index));
        }
        if let Some(end) = previous_end
            && window.start <= end
        {
            return Err(ConfigError::WindowsOverlap(index));
        }
        previous_end = Some(window.end);
    }
    Ok(())
}

impl Validate for ControlConfig {
    const KIND: ConfigKind = ConfigKind::Control;

    fn validate(&self) -> Result<(), ConfigError> {
        positive("setpoint", self.setpoint)?;
        positive("liters_per_event", self.liters_per_event)?;
        nonzero("deadtime_sec", self.deadtime_sec)?;
        positive("time_window_days", self.time_window_days)?;
        non_negative("kp", self.kp)?;
        non_negative("ki", self.ki)?;
        non_negative("kd", self.kd)?;
        non_negative("kimax", self.kimax)?;
        if !(0.0..=1.0).contains(&self.kidec) {
            return Err(ConfigError::OutOfRange("kidec"));
        }
        validate_windows(&self.watering_windows)?;

        let required = self.worst_case_events();
        if required > EVENT_LOG_CAPACITY {
            return Err(ConfigError::EventLogCapacity {
                required,
                capacity: EVENT_LOG_CAPACITY,
            });
        }
        Ok(())
    }
}

impl Validate for HardwareConfig {
    const KIND: ConfigKind = ConfigKind::Hardware;

    fn validate(&self) -> Result<(), ConfigError> {
        nonzero("water_pump_time_s", self.water_pump_time_s)?;
        duty("water_pump_duty_percent", self.water_pump_duty_percent)?;
        positive("nutrients_pump_volume_ml", self.nutrients_pump_volume_ml)?;
        duty(
            "nutrients_pump_duty_percent",
            self.nutrients_pump_duty_percent,
        )?;
        nonzero("valve_closing_time_s", self.valve_closing_time_s)?;
        positive("nutrient_flow_ml_per_sec", self.nutrient_flow_ml_per_sec)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert_eq!(ControlConfig::default().validate(), Ok(()));
        assert_eq!(HardwareConfig::default().validate(), Ok(()));
    }

    #[test]
    fn integral_bound_follows_gains() {
        let config = ControlConfig::default();
        assert!((config.integral_max() - 4_000.0).abs() < 1e-6);

        let proportional = ControlConfig {
            ki: 0.0,
            ..ControlConfig::default()
        };
        assert_eq!(proportional.integral_max(), 0.0);
    }

    #[test]
    fn rejects_non_positive_and_nan_fields() {
        let config = ControlConfig {
            setpoint: 0.0,
            ..ControlConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NotPositive("setpoint")));

        let config = ControlConfig {
            time_window_days: f64::NAN,
            ..ControlConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive("time_window_days"))
        );

        let config = ControlConfig {
            kd: -0.5,
            ..ControlConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Negative("kd")));
    }

    #[test]
    fn kidec_must_be_a_fraction() {
        let config = ControlConfig {
            kidec: 1.5,
            ..ControlConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::OutOfRange("kidec")));
    }

    #[test]
    fn windows_must_be_sorted_and_disjoint() {
        let inverted = [WateringWindow::new(500, 100)];
        assert_eq!(
            validate_windows(&inverted),
            Err(ConfigError::WindowInverted(0))
        );

        let overlapping = [WateringWindow::new(100, 500), WateringWindow::new(500, 900)];
        assert_eq!(
            validate_windows(&overlapping),
            Err(ConfigError::WindowsOverlap(1))
        );

        let unsorted = [WateringWindow::new(1_000, 2_000), WateringWindow::new(10, 20)];
        assert_eq!(
            validate_windows(&unsorted),
            Err(ConfigError::WindowsOverlap(1))
        );

        let past_midnight = [WateringWindow::new(80_000, 86_400)];
        assert_eq!(
            validate_windows(&past_midnight),
            Err(ConfigError::WindowOutOfDay(0))
        );
    }

    #[test]
    fn rejects_configs_that_would_overflow_the_log() {
        let mut windows = WindowList::new();
        windows
            .push(WateringWindow::new(0, 86_399))
            .expect("window list has room");
        let config = ControlConfig {
            deadtime_sec: 60,
            watering_windows: windows,
            ..ControlConfig::default()
        };

        match config.validate() {
            Err(ConfigError::EventLogCapacity { required, capacity }) => {
                assert!(required > capacity);
            }
            other => panic!("unexpected validation result: {other:?}"),
        }
    }

    #[test]
    fn huge_time_windows_are_rejected_not_wrapped() {
        for days in [1e20, f64::MAX] {
            let config = ControlConfig {
                time_window_days: days,
                ..ControlConfig::default()
            };
            assert_eq!(config.worst_case_events(), usize::MAX);
            assert_eq!(
                config.validate(),
                Err(ConfigError::EventLogCapacity {
                    required: usize::MAX,
                    capacity: EVENT_LOG_CAPACITY,
                })
            );
        }
    }

    #[test]
    fn worst_case_counts_a_partial_trailing_day() {
        let whole = ControlConfig::default();
        let partial = ControlConfig {
            time_window_days: 1.5,
            ..ControlConfig::default()
        };
        // Defaults: 09:00-09:15 admits 2 doses, 19:00-21:00 admits 13.
        assert_eq!(whole.worst_case_events(), 15 * 2);
        assert_eq!(partial.worst_case_events(), 15 * 3);
    }

    #[test]
    fn hardware_duty_must_be_within_percent_range() {
        let config = HardwareConfig {
            nutrients_pump_duty_percent: 0,
            ..HardwareConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::OutOfRange("nutrients_pump_duty_percent"))
        );

        let config = HardwareConfig {
            water_pump_duty_percent: 101,
            ..HardwareConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::OutOfRange("water_pump_duty_percent"))
        );
    }

    #[test]
    fn windows_render_as_clock_ranges() {
        let mut text: heapless::String<32> = heapless::String::new();
        core::fmt::write(&mut text, format_args!("{}", WateringWindow::from_clock(9, 0, 9, 15)))
            .expect("window fits");
        assert_eq!(text.as_str(), "09:00-09:15");
    }
}

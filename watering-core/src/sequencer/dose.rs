//! Per-cycle dose timing derived from the hardware config.

use crate::config::HardwareConfig;

/// Duty cycle and run time for a single pump.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PumpRun {
    pub duty_percent: u8,
    pub run_time_s: u32,
}

/// Timing captured when a cycle starts. Later hardware config replacements
/// only affect the next cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DosePlan {
    pub valve_closing_s: u32,
    pub water: PumpRun,
    pub nutrients: PumpRun,
}

impl DosePlan {
    #[must_use]
    pub fn from_config(config: &HardwareConfig) -> Self {
        Self {
            valve_closing_s: config.valve_closing_time_s,
            water: PumpRun {
                duty_percent: config.water_pump_duty_percent,
                run_time_s: config.water_pump_time_s,
            },
            nutrients: PumpRun {
                duty_percent: config.nutrients_pump_duty_percent,
                run_time_s: nutrients_run_time_s(
                    config.nutrients_pump_volume_ml,
                    config.nutrients_pump_duty_percent,
                    config.nutrient_flow_ml_per_sec,
                ),
            },
        }
    }

    /// Seconds from trigger to the valve reopening.
    #[must_use]
    pub fn total_s(&self) -> u32 {
        self.valve_closing_s
            .saturating_add(self.water.run_time_s.max(self.nutrients.run_time_s))
    }
}

/// Nutrient pump run time: `round(volume · duty / (100 · flow))`, rounding
/// halves away from zero.
///
/// Non-finite or non-positive inputs yield zero, which stops the pump on the
/// first tick.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn nutrients_run_time_s(volume_ml: f64, duty_percent: u8, flow_ml_per_sec: f64) -> u32 {
    let seconds = volume_ml * f64::from(duty_percent) / (100.0 * flow_ml_per_sec);
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    if seconds >= f64::from(u32::MAX) {
        return u32::MAX;
    }
    (seconds + 0.5) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_board_doses_for_sixteen_seconds() {
        assert_eq!(nutrients_run_time_s(25.0, 100, 1.58), 16);
    }

    #[test]
    fn halves_round_up() {
        assert_eq!(nutrients_run_time_s(5.0, 100, 2.0), 3);
        assert_eq!(nutrients_run_time_s(4.9, 100, 2.0), 2);
    }

    #[test]
    fn degenerate_flow_stops_immediately() {
        assert_eq!(nutrients_run_time_s(25.0, 100, 0.0), 0);
        assert_eq!(nutrients_run_time_s(25.0, 100, f64::NAN), 0);
    }

    #[test]
    fn plan_mirrors_config() {
        let plan = DosePlan::from_config(&HardwareConfig::default());
        assert_eq!(plan.valve_closing_s, 5);
        assert_eq!(plan.water.run_time_s, 40);
        assert_eq!(plan.nutrients.run_time_s, 16);
        assert_eq!(plan.total_s(), 45);
    }
}

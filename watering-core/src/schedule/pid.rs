//! PID controller deciding when the next dose is due.
//!
//! The integral is clamped on every update, not only when the output
//! saturates, and both bounds are symmetric. After each dose the caller pulls
//! the integral back by a fraction of its bound so the controller does not
//! re-trigger on the very next tick.

use crate::config::ControlConfig;

/// Proportional, integral and derivative gains.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    #[must_use]
    pub const fn from_config(config: &ControlConfig) -> Self {
        Self {
            kp: config.kp,
            ki: config.ki,
            kd: config.kd,
        }
    }
}

/// Individual contributions of one controller update.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PidTerms {
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

impl PidTerms {
    /// Sum of the three terms.
    #[must_use]
    pub fn control(&self) -> f64 {
        self.p + self.i + self.d
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PidController {
    gains: PidGains,
    integral_max: f64,
    integral_error: f64,
    last_error: f64,
}

impl PidController {
    #[must_use]
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            gains: PidGains::from_config(config),
            integral_max: config.integral_max(),
            integral_error: 0.0,
            last_error: 0.0,
        }
    }

    /// Adopts new gains while keeping the accumulated state.
    ///
    /// The stored integral is clamped against the new bound immediately.
    pub fn retune(&mut self, config: &ControlConfig) {
        self.gains = PidGains::from_config(config);
        self.integral_max = config.integral_max();
        self.clamp_integral();
    }

    /// Runs one update and returns the raw control value with its terms.
    pub fn update(&mut self, current_value: f64, setpoint: f64) -> (f64, PidTerms) {
        let error = setpoint - current_value;

        self.integral_error += error;
        self.clamp_integral();

        let derivative = error - self.last_error;
        self.last_error = error;

        let terms = PidTerms {
            p: self.gains.kp * error,
            i: self.gains.ki * self.integral_error,
            d: self.gains.kd * derivative,
        };
        (terms.control(), terms)
    }

    /// Removes `fraction` of the integral bound from the accumulated error.
    pub fn pullback(&mut self, fraction: f64) {
        self.integral_error -= fraction * self.integral_max;
        self.clamp_integral();
    }

    /// Clears the accumulated state.
    pub fn reset(&mut self) {
        self.integral_error = 0.0;
        self.last_error = 0.0;
    }

    #[must_use]
    pub fn integral_error(&self) -> f64 {
        self.integral_error
    }

    #[must_use]
    pub fn integral_max(&self) -> f64 {
        self.integral_max
    }

    #[must_use]
    pub fn last_error(&self) -> f64 {
        self.last_error
    }

    #[must_use]
    pub fn gains(&self) -> PidGains {
        self.gains
    }

    fn clamp_integral(&mut self) {
        self.integral_error = self
            .integral_error
            .min(self.integral_max)
            .max(-self.integral_max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kp: f64, ki: f64, kd: f64) -> ControlConfig {
        ControlConfig {
            kp,
            ki,
            kd,
            ..ControlConfig::default()
        }
    }

    #[test]
    fn proportional_term_tracks_error() {
        let mut pid = PidController::new(&config(2.0, 0.0, 0.0));
        let (control, terms) = pid.update(1.0, 4.0);
        assert!((control - 6.0).abs() < 1e-9);
        assert!((terms.p - 6.0).abs() < 1e-9);
        assert_eq!(terms.i, 0.0);
    }

    #[test]
    fn integral_is_clamped_every_update() {
        let cfg = ControlConfig {
            kimax: 0.001,
            ..config(0.0, 1.0, 0.0)
        };
        let mut pid = PidController::new(&cfg);
        let bound = pid.integral_max();

        for _ in 0..10 {
            pid.update(0.0, 4.0);
            assert!(pid.integral_error() <= bound);
        }
        assert!((pid.integral_error() - bound).abs() < 1e-12);

        for _ in 0..10 {
            pid.update(100.0, 4.0);
            assert!(pid.integral_error() >= -bound);
        }
        assert!((pid.integral_error() + bound).abs() < 1e-12);
    }

    #[test]
    fn derivative_uses_previous_error() {
        let mut pid = PidController::new(&config(0.0, 0.0, 1.0));
        let (_, first) = pid.update(0.0, 4.0);
        assert!((first.d - 4.0).abs() < 1e-9);
        let (_, second) = pid.update(4.0, 4.0);
        assert!((second.d + 4.0).abs() < 1e-9);
        assert_eq!(pid.last_error(), 0.0);
    }

    #[test]
    fn pullback_never_escapes_the_bound() {
        let cfg = ControlConfig {
            kidec: 1.0,
            ..config(1.0, 0.001, 0.0)
        };
        let mut pid = PidController::new(&cfg);
        pid.pullback(cfg.kidec);
        pid.pullback(cfg.kidec);
        assert!((pid.integral_error() + pid.integral_max()).abs() < 1e-9);
    }

    #[test]
    fn zero_integral_gain_pins_the_integral() {
        let mut pid = PidController::new(&config(1.0, 0.0, 0.0));
        for _ in 0..100 {
            pid.update(0.0, 4.0);
        }
        pid.pullback(0.5);
        assert_eq!(pid.integral_error(), 0.0);
    }

    #[test]
    fn retune_clamps_existing_integral() {
        let mut pid = PidController::new(&config(1.0, 0.001, 0.0));
        for _ in 0..500 {
            pid.update(0.0, 4.0);
        }
        assert!(pid.integral_error() > 1_000.0);

        pid.retune(&config(1.0, 0.01, 0.0));
        assert!(pid.integral_error() <= pid.integral_max());
        assert!((pid.integral_max() - 400.0).abs() < 1e-6);
    }
}

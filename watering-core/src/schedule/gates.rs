//! Time-of-day and spacing gates applied before a dose may fire.

use crate::config::WateringWindow;
use crate::{Timestamp, second_of_day};

/// Admits timestamps that fall inside any configured daily window.
#[derive(Copy, Clone, Debug)]
pub struct WindowGate<'a> {
    windows: &'a [WateringWindow],
}

impl<'a> WindowGate<'a> {
    #[must_use]
    pub const fn new(windows: &'a [WateringWindow]) -> Self {
        Self { windows }
    }

    /// Returns `true` when `now` lies inside a window (bounds inclusive).
    #[must_use]
    pub fn contains(&self, now: Timestamp) -> bool {
        let second = second_of_day(now);
        self.windows.iter().any(|window| window.contains(second))
    }
}

/// Enforces a minimum spacing between doses.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeadTimeGuard {
    deadtime_sec: u32,
}

impl DeadTimeGuard {
    #[must_use]
    pub const fn new(deadtime_sec: u32) -> Self {
        Self { deadtime_sec }
    }

    /// Returns `true` when at least the dead-time has passed since the last
    /// dose. A clock that reads earlier than the last dose is never clear.
    #[must_use]
    pub fn is_clear(&self, now: Timestamp, last_event_time: Option<Timestamp>) -> bool {
        match last_event_time {
            None => true,
            Some(last) => {
                now >= last && now - last >= u64::from(self.deadtime_sec)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIDNIGHT: Timestamp = 19_676 * 86_400;

    #[test]
    fn window_bounds_are_inclusive() {
        let windows = [WateringWindow::from_clock(9, 0, 9, 15)];
        let gate = WindowGate::new(&windows);

        assert!(!gate.contains(MIDNIGHT + 32_399));
        assert!(gate.contains(MIDNIGHT + 32_400));
        assert!(gate.contains(MIDNIGHT + 33_300));
        assert!(!gate.contains(MIDNIGHT + 33_301));
    }

    #[test]
    fn windows_repeat_every_day() {
        let windows = [WateringWindow::from_clock(19, 0, 21, 0)];
        let gate = WindowGate::new(&windows);
        for day in 0..5 {
            assert!(gate.contains(MIDNIGHT + day * 86_400 + 72_000));
        }
    }

    #[test]
    fn empty_window_list_never_admits() {
        let gate = WindowGate::new(&[]);
        assert!(!gate.contains(MIDNIGHT + 40_000));
    }

    #[test]
    fn dead_time_is_inclusive_of_the_limit() {
        let guard = DeadTimeGuard::new(600);
        assert!(guard.is_clear(1_000, None));
        assert!(!guard.is_clear(1_599, Some(1_000)));
        assert!(guard.is_clear(1_600, Some(1_000)));
        assert!(!guard.is_clear(900, Some(1_000)));
    }
}

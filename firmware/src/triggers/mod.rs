//! Manual trigger plumbing between the button task and the control loop.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use watering_core::Timestamp;
use watering_core::triggers::{TRIGGER_INBOX_DEPTH, TriggerRequest, TriggerSource};

#[cfg(target_os = "none")]
pub type TriggerMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
pub type TriggerMutex = NoopRawMutex;

/// Queue carrying button presses to the control task.
pub type TriggerQueue = Channel<TriggerMutex, TriggerRequest, TRIGGER_INBOX_DEPTH>;

pub type TriggerSender<'a> = Sender<'a, TriggerMutex, TriggerRequest, TRIGGER_INBOX_DEPTH>;

pub type TriggerReceiver<'a> = Receiver<'a, TriggerMutex, TriggerRequest, TRIGGER_INBOX_DEPTH>;

/// Button sampling period.
pub const BUTTON_POLL_MS: u64 = 100;

/// Consecutive pressed samples required before a press counts.
pub const BUTTON_STABLE_SAMPLES: u8 = 2;

/// Edge detector for a polled, bouncing push button.
///
/// One press yields one request no matter how long the button is held.
#[derive(Debug, Default)]
pub struct ButtonDebouncer {
    pressed_samples: u8,
    latched: bool,
}

impl ButtonDebouncer {
    pub const fn new() -> Self {
        Self {
            pressed_samples: 0,
            latched: false,
        }
    }

    /// Feeds one sample and returns `true` on a debounced press.
    pub fn sample(&mut self, pressed: bool) -> bool {
        if !pressed {
            self.pressed_samples = 0;
            self.latched = false;
            return false;
        }

        self.pressed_samples = self.pressed_samples.saturating_add(1);
        if !self.latched && self.pressed_samples >= BUTTON_STABLE_SAMPLES {
            self.latched = true;
            return true;
        }
        false
    }
}

/// Queues a button press; a full queue drops the newest request.
pub fn submit_button_press(
    sender: &TriggerSender<'_>,
    now: Timestamp,
) -> Result<(), TriggerRequest> {
    match sender.try_send(TriggerRequest::new(TriggerSource::Button, now)) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(request)) => Err(request),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounce_yields_a_single_press() {
        let mut button = ButtonDebouncer::new();
        let samples = [true, false, true, true, true, true, false, false];
        let presses: Vec<bool> = samples.iter().map(|&s| button.sample(s)).collect();
        assert_eq!(
            presses,
            vec![false, false, false, true, false, false, false, false]
        );
    }

    #[test]
    fn release_rearms_the_detector() {
        let mut button = ButtonDebouncer::new();
        assert!(!button.sample(true));
        assert!(button.sample(true));
        assert!(!button.sample(false));
        assert!(!button.sample(true));
        assert!(button.sample(true));
    }

    #[test]
    fn full_queue_returns_the_request() {
        let queue = TriggerQueue::new();
        let sender = queue.sender();
        for second in 0..TRIGGER_INBOX_DEPTH as u64 {
            submit_button_press(&sender, second).expect("queue has room");
        }
        let rejected = submit_button_press(&sender, 99).expect_err("queue is full");
        assert_eq!(rejected.requested_at, 99);
        assert_eq!(queue.receiver().try_receive().map(|r| r.requested_at), Ok(0));
    }
}

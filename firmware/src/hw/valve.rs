//! Bistable valve coil driver.
//!
//! Switching between coils always releases both first and only energizes
//! the requested coil after [`COIL_DEAD_TIME`] has passed, so the two
//! outputs are never driven together by this driver.

use embassy_time::Duration;
use watering_core::sequencer::ValveCoils;

/// Gap between releasing one coil and energizing the other.
pub const COIL_DEAD_TIME: Duration = Duration::from_millis(10);

/// Raw access to the two coil outputs.
pub trait CoilPins {
    fn drive(&mut self, coils: ValveCoils);

    /// Reads back the output latches.
    fn sample(&self) -> ValveCoils;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coil {
    Open,
    Close,
}

impl Coil {
    const fn energized(self) -> ValveCoils {
        match self {
            Coil::Open => ValveCoils {
                open: true,
                close: false,
            },
            Coil::Close => ValveCoils {
                open: false,
                close: true,
            },
        }
    }
}

pub struct ValveDriver<P> {
    pins: P,
    pending: Option<Coil>,
}

impl<P: CoilPins> ValveDriver<P> {
    pub fn new(mut pins: P) -> Self {
        pins.drive(ValveCoils::default());
        Self {
            pins,
            pending: None,
        }
    }

    /// Releases both coils and arms `coil` for [`Self::energize_pending`].
    pub fn request(&mut self, coil: Coil) {
        self.pins.drive(ValveCoils::default());
        self.pending = Some(coil);
    }

    pub fn pending(&self) -> Option<Coil> {
        self.pending
    }

    /// Energizes the armed coil once the dead-time has elapsed.
    pub fn energize_pending(&mut self) -> Option<Coil> {
        let coil = self.pending.take()?;
        self.pins.drive(coil.energized());
        Some(coil)
    }

    /// Reports the coil state the sequencer should see.
    ///
    /// While a coil is armed the valve is still in transit; reporting the
    /// target keeps a mid-switch sample from reading as released.
    pub fn coils(&self) -> ValveCoils {
        let sampled = self.pins.sample();
        match self.pending {
            Some(coil) if !sampled.is_conflicting() => coil.energized(),
            _ => sampled,
        }
    }
}

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Board bindings for the valve and the two dosing pumps.
//!
//! Pin map (STM32G0B1):
//! - PA0 valve close coil, PA1 valve open coil (push-pull, idle low)
//! - PA6 water pump, PA7 nutrient pump (TIM3 CH1/CH2, 10 kHz PWM)
//! - PC13 manual trigger button (active low, pull-up)
//! - PA5 heartbeat LED

pub mod valve;

/// PWM carrier for both pump drivers.
pub const PUMP_PWM_FREQ_KHZ: u32 = 10;

#[cfg(target_os = "none")]
pub use board::{HardwareActuators, OutputCoils};

#[cfg(target_os = "none")]
mod board {
    use embassy_stm32::gpio::Output;
    use embassy_stm32::peripherals::TIM3;
    use embassy_stm32::timer::simple_pwm::SimplePwmChannel;
    use embassy_time::Timer;
    use watering_core::sequencer::{Actuators, PumpId, ValveCoils};

    use super::valve::{COIL_DEAD_TIME, CoilPins, Coil, ValveDriver};

    pub struct OutputCoils<'d> {
        open: Output<'d>,
        close: Output<'d>,
    }

    impl<'d> OutputCoils<'d> {
        pub fn new(open: Output<'d>, close: Output<'d>) -> Self {
            Self { open, close }
        }
    }

    impl CoilPins for OutputCoils<'_> {
        fn drive(&mut self, coils: ValveCoils) {
            // Release before energizing so a transition never overlaps.
            if !coils.open {
                self.open.set_low();
            }
            if !coils.close {
                self.close.set_low();
            }
            if coils.open {
                self.open.set_high();
            }
            if coils.close {
                self.close.set_high();
            }
        }

        fn sample(&self) -> ValveCoils {
            ValveCoils {
                open: self.open.is_set_high(),
                close: self.close.is_set_high(),
            }
        }
    }

    pub struct HardwareActuators<'d> {
        valve: ValveDriver<OutputCoils<'d>>,
        water: SimplePwmChannel<'d, TIM3>,
        nutrients: SimplePwmChannel<'d, TIM3>,
    }

    impl<'d> HardwareActuators<'d> {
        pub fn new(
            coils: OutputCoils<'d>,
            mut water: SimplePwmChannel<'d, TIM3>,
            mut nutrients: SimplePwmChannel<'d, TIM3>,
        ) -> Self {
            water.set_duty_cycle_fully_off();
            nutrients.set_duty_cycle_fully_off();
            water.enable();
            nutrients.enable();
            Self {
                valve: ValveDriver::new(coils),
                water,
                nutrients,
            }
        }

        /// Waits out the coil dead-time and energizes any armed coil.
        pub async fn settle(&mut self) {
            if self.valve.pending().is_none() {
                return;
            }
            Timer::after(COIL_DEAD_TIME).await;
            if let Some(coil) = self.valve.energize_pending() {
                defmt::debug!("valve: {} coil energized", coil_label(coil));
            }
        }
    }

    impl Actuators for HardwareActuators<'_> {
        fn close_valve(&mut self) {
            self.valve.request(Coil::Close);
        }

        fn open_valve(&mut self) {
            self.valve.request(Coil::Open);
        }

        fn set_pump_duty(&mut self, pump: PumpId, percent: u8) {
            let channel = match pump {
                PumpId::Water => &mut self.water,
                PumpId::Nutrients => &mut self.nutrients,
            };
            channel.set_duty_cycle_percent(percent.min(100));
        }

        fn valve_coils(&self) -> ValveCoils {
            self.valve.coils()
        }
    }

    const fn coil_label(coil: Coil) -> &'static str {
        match coil {
            Coil::Open => "open",
            Coil::Close => "close",
        }
    }
}

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, OutputType, Pull, Speed};
use embassy_stm32::time::khz;
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use static_cell::StaticCell;
use watering_core::config::{ControlConfig, HardwareConfig};
use watering_core::controller::WateringController;

use crate::hw::{HardwareActuators, OutputCoils, PUMP_PWM_FREQ_KHZ};
use crate::triggers::TriggerQueue;

mod button_task;
mod console_task;
mod control_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Controller shared by the control loop and the console.
pub(super) type SharedController = Mutex<ThreadModeRawMutex, WateringController>;

pub(super) static TRIGGER_QUEUE: TriggerQueue = Channel::new();
static CONTROLLER: StaticCell<SharedController> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA5,
        PA6,
        PA7,
        PC13,
        TIM3,
        USART5,
        PB0,
        PB1,
        ..
    } = hal::init(config);

    let coils = OutputCoils::new(
        Output::new(PA1, Level::Low, Speed::Low),
        Output::new(PA0, Level::Low, Speed::Low),
    );
    let pumps = SimplePwm::new(
        TIM3,
        Some(PwmPin::new(PA6, OutputType::PushPull)),
        Some(PwmPin::new(PA7, OutputType::PushPull)),
        None,
        None,
        khz(PUMP_PWM_FREQ_KHZ),
        CountingMode::EdgeAlignedUp,
    );
    let channels = pumps.split();
    let actuators = HardwareActuators::new(coils, channels.ch1, channels.ch2);

    let controller = WateringController::new(ControlConfig::default(), HardwareConfig::default())
        .expect("default configs are valid");
    let controller: &'static SharedController = CONTROLLER.init(Mutex::new(controller));

    spawner
        .spawn(control_task::run(
            controller,
            actuators,
            TRIGGER_QUEUE.receiver(),
        ))
        .expect("failed to spawn control task");

    spawner
        .spawn(button_task::run(
            Input::new(PC13, Pull::Up),
            Output::new(PA5, Level::Low, Speed::Low),
            TRIGGER_QUEUE.sender(),
        ))
        .expect("failed to spawn button task");

    spawner
        .spawn(console_task::run(controller, USART5, PB0, PB1))
        .expect("failed to spawn console task");

    core::future::pending::<()>().await;
}

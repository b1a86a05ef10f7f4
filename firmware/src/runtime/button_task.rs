use embassy_stm32::gpio::{Input, Output};
use embassy_time::{Duration, Instant, Ticker};

use crate::status;
use crate::triggers::{BUTTON_POLL_MS, ButtonDebouncer, TriggerSender, submit_button_press};

#[embassy_executor::task]
pub async fn run(button: Input<'static>, mut led: Output<'static>, triggers: TriggerSender<'static>) -> ! {
    let mut debouncer = ButtonDebouncer::new();
    let mut ticker = Ticker::every(Duration::from_millis(BUTTON_POLL_MS));

    loop {
        ticker.next().await;
        led.toggle();

        if debouncer.sample(button.is_low()) {
            let now = status::wall_clock(Instant::now().as_secs());
            defmt::info!("button: trigger at {}", now);
            if submit_button_press(&triggers, now).is_err() {
                defmt::warn!("button: trigger queue full, press dropped");
            }
        }
    }
}

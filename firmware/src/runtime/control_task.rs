use embassy_time::{Duration, Instant, Ticker};
use watering_core::schedule::NoopEventStore;

use super::SharedController;
use crate::hw::HardwareActuators;
use crate::status;
use crate::telemetry::TelemetryMirror;
use crate::triggers::TriggerReceiver;

/// Control loop period.
const TICK_PERIOD: Duration = Duration::from_secs(1);

#[embassy_executor::task]
pub async fn run(
    controller: &'static SharedController,
    mut actuators: HardwareActuators<'static>,
    triggers: TriggerReceiver<'static>,
) -> ! {
    // TODO: back the event log with the second flash bank so doses survive a
    // reset; until then every boot starts with an empty history.
    let mut store = NoopEventStore;
    let mut mirror = TelemetryMirror::new();

    {
        let mut controller = controller.lock().await;
        let uptime = Instant::now().as_secs();
        controller.start(status::wall_clock(uptime), &mut actuators, &mut store);
        status::record_tick(&controller.status(), false, uptime);
        mirror.flush(controller.telemetry());
    }
    actuators.settle().await;

    let mut ticker = Ticker::every(TICK_PERIOD);
    loop {
        ticker.next().await;
        let uptime = Instant::now().as_secs();
        let now = status::wall_clock(uptime);

        {
            let mut controller = controller.lock().await;
            while let Ok(request) = triggers.try_receive() {
                // A full inbox records the drop itself.
                let _ = controller.submit(request.source, request.requested_at);
            }

            let report = controller.tick(now, &mut actuators, &mut store);
            if let Some(started) = report.started {
                defmt::info!("control: cycle started by {}", defmt::Display2Format(&started));
            }
            status::record_tick(&controller.status(), report.started.is_some(), uptime);
            mirror.flush(controller.telemetry());
        }

        actuators.settle().await;
    }
}

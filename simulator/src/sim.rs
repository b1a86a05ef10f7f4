use std::fmt;
use std::io;

use watering_core::config::{ControlConfig, HardwareConfig};
use watering_core::controller::WateringController;
use watering_core::sequencer::Completion;
use watering_core::{SECONDS_PER_DAY, Timestamp, second_of_day};

use crate::session::{SessionOptions, SimulatedActuators};
use crate::store::HostEventStore;

/// What one simulated day looked like.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    pub day: u64,
    pub doses: Vec<Timestamp>,
    pub completed_cycles: u32,
    pub faults: u32,
    /// Ticks whose event log write failed; the run keeps going regardless.
    pub store_failures: u32,
    pub closing_estimate: f64,
    pub closing_integral: f64,
}

impl fmt::Display for DaySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day {:>3}: doses=", self.day)?;
        if self.doses.is_empty() {
            f.write_str("none")?;
        }
        for (index, dose) in self.doses.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            let second = second_of_day(*dose);
            write!(f, "{:02}:{:02}", second / 3_600, (second % 3_600) / 60)?;
        }
        write!(
            f,
            " cycles={} faults={} store_failures={} estimate={:.3} integral={:.3}",
            self.completed_cycles,
            self.faults,
            self.store_failures,
            self.closing_estimate,
            self.closing_integral
        )
    }
}

/// Runs the controller unattended for `days`, ticking every
/// `options.tick_seconds` starting at `options.start` itself.
///
/// Failed event log writes are warned about and counted per day; only an
/// invalid default config aborts the run.
pub fn run_batch(options: SessionOptions, days: u64) -> io::Result<Vec<DaySummary>> {
    let mut controller = WateringController::new(ControlConfig::default(), HardwareConfig::default())
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error.to_string()))?;
    let mut actuators = SimulatedActuators::default();
    let mut store = HostEventStore::new(options.store_path);
    let step = options.tick_seconds.max(1);

    let mut now = options.start;
    controller.start(now, &mut actuators, &mut store);

    let mut summaries = Vec::new();
    for day in 0..days {
        let day_end = options.start + (day + 1) * SECONDS_PER_DAY;
        let mut summary = DaySummary {
            day: now / SECONDS_PER_DAY,
            doses: Vec::new(),
            completed_cycles: 0,
            faults: 0,
            store_failures: 0,
            closing_estimate: 0.0,
            closing_integral: 0.0,
        };

        while now < day_end {
            let report = controller.tick(now, &mut actuators, &mut store);
            if let Some(error) = report.decision.store_error {
                eprintln!("WARN event log not persisted: {error}");
                summary.store_failures += 1;
            }
            if report.decision.fire {
                summary.doses.push(now);
            }
            match report.completion {
                Some(Completion::Finished { .. }) => {
                    summary.completed_cycles += 1;
                }
                Some(Completion::Faulted { .. }) => summary.faults += 1,
                None => {}
            }

            actuators.run_for(step);
            now += step;
        }

        let status = controller.status();
        summary.closing_estimate = status.estimate;
        summary.closing_integral = status.integral_error;
        summaries.push(summary);
    }
    Ok(summaries)
}

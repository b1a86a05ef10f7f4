use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use watering_core::config::{ControlConfig, HardwareConfig};
use watering_core::console::{self, CommandError, CommandOutcome};
use watering_core::controller::WateringController;
use watering_core::sequencer::{Actuators, PumpId, ValveCoils};
use watering_core::telemetry::EventId;
use watering_core::{SECONDS_PER_DAY, Timestamp, second_of_day};

use crate::store::HostEventStore;

/// Settings shared by the interactive session and the batch simulation.
pub struct SessionOptions {
    pub start: Timestamp,
    pub tick_seconds: u64,
    pub store_path: Option<PathBuf>,
    pub transcript_path: Option<PathBuf>,
}

/// Host stand-in for the valve and pump drivers.
///
/// Coil changes take effect immediately; the tick loop has no sub-second
/// resolution for the firmware's coil dead-time to matter.
#[derive(Debug, Default)]
pub struct SimulatedActuators {
    coils: ValveCoils,
    water_duty: u8,
    nutrients_duty: u8,
    valve_operations: u32,
    water_pump_seconds: u64,
    nutrient_pump_seconds: u64,
}

impl SimulatedActuators {
    /// Energizes both coils, as a glitching driver would.
    pub fn inject_coil_fault(&mut self) {
        self.coils = ValveCoils {
            open: true,
            close: true,
        };
    }

    /// Accumulates pump run time for `seconds` at the current duty.
    pub fn run_for(&mut self, seconds: u64) {
        if self.water_duty > 0 {
            self.water_pump_seconds += seconds;
        }
        if self.nutrients_duty > 0 {
            self.nutrient_pump_seconds += seconds;
        }
    }

    pub fn describe(&self) -> String {
        let valve = match (self.coils.open, self.coils.close) {
            (true, true) => "FAULT",
            (true, false) => "open",
            (false, true) => "closed",
            (false, false) => "released",
        };
        format!(
            "valve={valve} water={}% nutrients={}% valve_ops={} water_s={} nutrients_s={}",
            self.water_duty,
            self.nutrients_duty,
            self.valve_operations,
            self.water_pump_seconds,
            self.nutrient_pump_seconds
        )
    }
}

impl Actuators for SimulatedActuators {
    fn close_valve(&mut self) {
        self.coils = ValveCoils {
            open: false,
            close: true,
        };
        self.valve_operations += 1;
    }

    fn open_valve(&mut self) {
        self.coils = ValveCoils {
            open: true,
            close: false,
        };
        self.valve_operations += 1;
    }

    fn set_pump_duty(&mut self, pump: PumpId, percent: u8) {
        match pump {
            PumpId::Water => self.water_duty = percent,
            PumpId::Nutrients => self.nutrients_duty = percent,
        }
    }

    fn valve_coils(&self) -> ValveCoils {
        self.coils
    }
}

/// Interactive console session driving a controller on a simulated clock.
pub struct Session {
    controller: WateringController,
    actuators: SimulatedActuators,
    store: HostEventStore,
    clock: Timestamp,
    tick_seconds: u64,
    telemetry_cursor: EventId,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    pub fn new(options: SessionOptions) -> io::Result<Self> {
        let controller = WateringController::new(ControlConfig::default(), HardwareConfig::default())
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error.to_string()))?;
        let transcript = options
            .transcript_path
            .as_deref()
            .map(TranscriptLogger::new)
            .transpose()?;

        let mut session = Self {
            controller,
            actuators: SimulatedActuators::default(),
            store: HostEventStore::new(options.store_path),
            clock: options.start,
            tick_seconds: options.tick_seconds.max(1),
            telemetry_cursor: 0,
            transcript,
        };
        session
            .controller
            .start(session.clock, &mut session.actuators, &mut session.store);
        Ok(session)
    }

    pub fn clock(&self) -> Timestamp {
        self.clock
    }

    /// Handles one console line and returns the lines to print.
    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        let clock = self.clock;
        if let Some(transcript) = &mut self.transcript {
            transcript.append_line(clock, TranscriptRole::Host, trimmed)?;
        }

        let mut lines = if trimmed.eq_ignore_ascii_case("fault") {
            self.actuators.inject_coil_fault();
            let mut lines = vec!["both valve coils energized".to_string()];
            lines.extend(self.advance(self.tick_seconds));
            lines
        } else if trimmed.eq_ignore_ascii_case("hw") {
            vec![self.actuators.describe()]
        } else {
            self.execute(trimmed)
        };
        lines.extend(self.drain_telemetry());

        if let Some(transcript) = &mut self.transcript {
            for response in &lines {
                transcript.append_line(clock, TranscriptRole::Simulator, response)?;
            }
        }
        Ok(lines)
    }

    /// Advances the simulated clock, ticking the controller at the configured
    /// cadence.
    pub fn advance(&mut self, seconds: u64) -> Vec<String> {
        let mut lines = Vec::new();
        let target = self.clock.saturating_add(seconds);
        while self.clock < target {
            let step = self.tick_seconds.min(target - self.clock);
            self.actuators.run_for(step);
            self.clock += step;
            let report = self
                .controller
                .tick(self.clock, &mut self.actuators, &mut self.store);
            if let Some(error) = report.decision.store_error {
                lines.push(format!("WARN event log not persisted: {error}"));
            }
        }
        lines.push(format!("now {}", format_clock(self.clock)));
        lines
    }

    fn execute(&mut self, line: &str) -> Vec<String> {
        let mut output = String::new();
        match console::execute(line, &mut self.controller, self.clock, &mut output) {
            Ok(CommandOutcome::Advance(seconds)) => self.advance(seconds),
            Ok(_) => output.lines().map(str::to_string).collect(),
            Err(CommandError::Parse(error)) => vec![format!("ERR syntax {error}")],
            Err(error) => vec![format!("ERR {error}")],
        }
    }

    fn drain_telemetry(&mut self) -> Vec<String> {
        let telemetry = self.controller.telemetry();
        let lines = telemetry
            .since(self.telemetry_cursor)
            .map(|record| format!("[{}] {record}", format_clock(record.timestamp)))
            .collect();
        self.telemetry_cursor = telemetry.next_event_id();
        lines
    }
}

/// Renders a timestamp as `day N HH:MM:SS`.
pub fn format_clock(timestamp: Timestamp) -> String {
    let second = second_of_day(timestamp);
    format!(
        "day {} {:02}:{:02}:{:02}",
        timestamp / SECONDS_PER_DAY,
        second / 3_600,
        (second % 3_600) / 60,
        second % 60
    )
}

enum TranscriptRole {
    Host,
    Simulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Simulator => "SIM <",
        }
    }
}

struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        writeln!(logger.writer, "# Watering controller simulator transcript")?;
        writeln!(logger.writer, "# Timestamps are simulated wall-clock time")?;
        writeln!(logger.writer)?;
        logger.writer.flush()?;
        Ok(logger)
    }

    fn append_line(&mut self, clock: Timestamp, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[{}] {} {}",
            format_clock(clock),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

//! Console command dispatcher.
//!
//! Parsed commands are applied to the [`WateringController`] and their
//! responses rendered into any `core::fmt::Write` sink, so the firmware and
//! simulator print identical text.

use core::fmt::{self, Write};

use crate::Timestamp;
use crate::config::patch::{self, PatchError};
use crate::config::{ConfigError, ConfigKind, ControlConfig, HardwareConfig};
use crate::controller::{StatusSnapshot, WateringController};
use crate::triggers::{InboxError, TriggerSource};

use super::grammar::{self, Assignment, Command, Keyword, ParseError};

/// Number of telemetry records shown by a bare `log`.
pub const DEFAULT_LOG_LINES: u16 = 10;

/// Command execution successes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandOutcome {
    /// A console trigger was queued for the next tick.
    TriggerQueued,
    /// Output was written; no state changed.
    Reported,
    /// A config replacement was validated and applied.
    Applied(ConfigKind),
    /// The host should advance its clock by this many seconds.
    Advance(u64),
}

/// Errors surfaced while executing a command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandError<'a> {
    Parse(ParseError<'a>),
    Patch(PatchError<'a>),
    Rejected(ConfigKind, ConfigError),
    Inbox(InboxError),
    Output,
}

impl fmt::Display for CommandError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(error) => error.fmt(f),
            CommandError::Patch(error) => error.fmt(f),
            CommandError::Rejected(kind, error) => write!(f, "{kind} config rejected: {error}"),
            CommandError::Inbox(error) => error.fmt(f),
            CommandError::Output => f.write_str("console output failed"),
        }
    }
}

impl<'a> From<ParseError<'a>> for CommandError<'a> {
    fn from(error: ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl<'a> From<PatchError<'a>> for CommandError<'a> {
    fn from(error: PatchError<'a>) -> Self {
        Self::Patch(error)
    }
}

impl From<InboxError> for CommandError<'_> {
    fn from(error: InboxError) -> Self {
        Self::Inbox(error)
    }
}

impl From<fmt::Error> for CommandError<'_> {
    fn from(_: fmt::Error) -> Self {
        Self::Output
    }
}

/// Parses and executes one console line.
///
/// # Errors
///
/// Returns a [`CommandError`] when the line does not parse, a config edit is
/// invalid, the trigger inbox is full, or the sink refuses output.
pub fn execute<'a, W: Write>(
    line: &'a str,
    controller: &mut WateringController,
    now: Timestamp,
    out: &mut W,
) -> Result<CommandOutcome, CommandError<'a>> {
    let command = grammar::parse(line)?;
    match command {
        Command::Trigger => {
            controller.submit(TriggerSource::Console, now)?;
            writeln!(out, "trigger queued")?;
            Ok(CommandOutcome::TriggerQueued)
        }
        Command::Status => {
            render_status(out, &controller.status())?;
            Ok(CommandOutcome::Reported)
        }
        Command::Config(kind) => {
            if kind != Some(ConfigKind::Hardware) {
                render_control(out, controller.control_config())?;
            }
            if kind != Some(ConfigKind::Control) {
                render_hardware(out, controller.hardware_config())?;
            }
            Ok(CommandOutcome::Reported)
        }
        Command::Set { kind, assignments } => {
            apply_assignments(controller, kind, &assignments, now)?;
            writeln!(out, "{kind} config applied")?;
            Ok(CommandOutcome::Applied(kind))
        }
        Command::Windows(windows) => {
            let candidate = ControlConfig {
                watering_windows: windows,
                ..controller.control_config().clone()
            };
            controller
                .apply_control(candidate, now)
                .map_err(|error| CommandError::Rejected(ConfigKind::Control, error))?;
            render_windows(out, controller.control_config())?;
            Ok(CommandOutcome::Applied(ConfigKind::Control))
        }
        Command::Advance(seconds) => Ok(CommandOutcome::Advance(seconds)),
        Command::Log(count) => {
            render_log(out, controller, count.unwrap_or(DEFAULT_LOG_LINES))?;
            Ok(CommandOutcome::Reported)
        }
        Command::Events => {
            render_events(out, controller)?;
            Ok(CommandOutcome::Reported)
        }
        Command::Help(topic) => {
            render_help(out, topic)?;
            Ok(CommandOutcome::Reported)
        }
    }
}

fn apply_assignments<'a>(
    controller: &mut WateringController,
    kind: ConfigKind,
    assignments: &[Assignment<'a>],
    now: Timestamp,
) -> Result<(), CommandError<'a>> {
    let result = match kind {
        ConfigKind::Control => {
            let mut candidate = controller.control_config().clone();
            for assignment in assignments {
                patch::apply_control(&mut candidate, assignment.key, assignment.value)?;
            }
            controller.apply_control(candidate, now)
        }
        ConfigKind::Hardware => {
            let mut candidate = *controller.hardware_config();
            for assignment in assignments {
                patch::apply_hardware(&mut candidate, assignment.key, assignment.value)?;
            }
            controller.apply_hardware(candidate, now)
        }
    };
    result.map_err(|error| CommandError::Rejected(kind, error))
}

/// Writes the status block shown by `status`.
///
/// # Errors
///
/// Propagates sink failures.
pub fn render_status<W: Write>(out: &mut W, status: &StatusSnapshot) -> fmt::Result {
    writeln!(
        out,
        "state={} since={} waterings={} pending={}",
        status.state, status.status_timestamp, status.watering_count, status.pending_triggers
    )?;
    write!(
        out,
        "events={} estimate={:.3} L/day integral={:.1} last=",
        status.events_in_window, status.estimate, status.integral_error
    )?;
    match status.last_event_time {
        Some(timestamp) => writeln!(out, "{timestamp}")?,
        None => writeln!(out, "never")?,
    }
    if let Some(diagnostics) = status.diagnostics {
        writeln!(
            out,
            "pid avg={:.3} control={:.3} p={:.3} i={:.3} d={:.3}",
            diagnostics.average,
            diagnostics.control,
            diagnostics.terms.p,
            diagnostics.terms.i,
            diagnostics.terms.d
        )?;
    }
    Ok(())
}

fn render_control<W: Write>(out: &mut W, config: &ControlConfig) -> fmt::Result {
    writeln!(out, "[control]")?;
    writeln!(out, "setpoint={}", config.setpoint)?;
    writeln!(out, "liters_per_event={}", config.liters_per_event)?;
    writeln!(out, "deadtime_sec={}", config.deadtime_sec)?;
    writeln!(out, "time_window_days={}", config.time_window_days)?;
    writeln!(out, "kp={} ki={} kd={}", config.kp, config.ki, config.kd)?;
    writeln!(out, "kimax={} kidec={}", config.kimax, config.kidec)?;
    render_windows(out, config)
}

fn render_windows<W: Write>(out: &mut W, config: &ControlConfig) -> fmt::Result {
    out.write_str("windows=")?;
    for (index, window) in config.watering_windows.iter().enumerate() {
        if index > 0 {
            out.write_char(' ')?;
        }
        write!(out, "{window}")?;
    }
    out.write_char('\n')
}

fn render_hardware<W: Write>(out: &mut W, config: &HardwareConfig) -> fmt::Result {
    writeln!(out, "[hw]")?;
    writeln!(out, "water_pump_time_s={}", config.water_pump_time_s)?;
    writeln!(out, "water_pump_duty_percent={}", config.water_pump_duty_percent)?;
    writeln!(out, "nutrients_pump_volume_ml={}", config.nutrients_pump_volume_ml)?;
    writeln!(
        out,
        "nutrients_pump_duty_percent={}",
        config.nutrients_pump_duty_percent
    )?;
    writeln!(out, "valve_closing_time_s={}", config.valve_closing_time_s)?;
    writeln!(out, "nutrient_flow_ml_per_sec={}", config.nutrient_flow_ml_per_sec)
}

fn render_log<W: Write>(out: &mut W, controller: &WateringController, count: u16) -> fmt::Result {
    let telemetry = controller.telemetry();
    let skip = telemetry.len().saturating_sub(usize::from(count));
    for record in telemetry.oldest_first().skip(skip) {
        writeln!(out, "{record}")?;
    }
    Ok(())
}

fn render_events<W: Write>(out: &mut W, controller: &WateringController) -> fmt::Result {
    let log = controller.scheduler().event_log();
    writeln!(out, "{} dose(s) in window", log.len())?;
    for timestamp in log.as_slice() {
        writeln!(out, "  {timestamp}")?;
    }
    Ok(())
}

fn render_help<W: Write>(out: &mut W, topic: Option<Keyword>) -> fmt::Result {
    match topic {
        Some(keyword) => {
            writeln!(out, "{}", keyword.usage())?;
            writeln!(out, "  {}", keyword.summary())?;
            match keyword {
                Keyword::Set => {
                    writeln!(out, "  control keys: {}", KeyList(patch::CONTROL_KEYS))?;
                    writeln!(out, "  hw keys: {}", KeyList(patch::HARDWARE_KEYS))?;
                }
                Keyword::Advance => writeln!(out, "  simulator only; firmware follows the RTC")?,
                _ => {}
            }
            Ok(())
        }
        None => {
            for keyword in Keyword::ALL {
                writeln!(out, "{:<8} {}", keyword.name(), keyword.summary())?;
            }
            Ok(())
        }
    }
}

struct KeyList(&'static [&'static str]);

impl fmt::Display for KeyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, key) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            f.write_str(key)?;
        }
        Ok(())
    }
}

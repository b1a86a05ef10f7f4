//! UART console front end.
//!
//! Assembles raw bytes into lines and dispatches them either to the board-only
//! `clock` command or to the shared command set in `watering_core::console`.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::fmt::Write;

use heapless::String;
use watering_core::Timestamp;
use watering_core::console::{self, CommandError, CommandOutcome};
use watering_core::controller::WateringController;

use crate::status;

/// Longest accepted command line.
pub const CONSOLE_LINE_CAPACITY: usize = 128;

/// Room for the longest response (`help`, `config`, `log`).
pub const CONSOLE_RESPONSE_CAPACITY: usize = 2048;

pub type ConsoleLine = String<CONSOLE_LINE_CAPACITY>;
pub type ConsoleResponse = String<CONSOLE_RESPONSE_CAPACITY>;

/// Collects bytes until a line terminator arrives.
#[derive(Debug, Default)]
pub struct LineAssembler {
    line: ConsoleLine,
    overflowed: bool,
}

/// Result of feeding one byte.
#[derive(Debug, PartialEq, Eq)]
pub enum LineEvent {
    Pending,
    Line(ConsoleLine),
    Overflow,
}

impl LineAssembler {
    pub const fn new() -> Self {
        Self {
            line: String::new(),
            overflowed: false,
        }
    }

    pub fn push(&mut self, byte: u8) -> LineEvent {
        match byte {
            b'\r' | b'\n' => {
                let overflowed = core::mem::take(&mut self.overflowed);
                let line = core::mem::take(&mut self.line);
                if overflowed {
                    LineEvent::Overflow
                } else if line.trim().is_empty() {
                    LineEvent::Pending
                } else {
                    LineEvent::Line(line)
                }
            }
            // Backspace and DEL.
            0x08 | 0x7f => {
                self.line.pop();
                LineEvent::Pending
            }
            byte if byte.is_ascii() && !byte.is_ascii_control() => {
                if self.line.push(char::from(byte)).is_err() {
                    self.overflowed = true;
                }
                LineEvent::Pending
            }
            _ => LineEvent::Pending,
        }
    }
}

/// Runs one console line against the controller and renders the response.
pub fn respond(
    line: &str,
    controller: &mut WateringController,
    uptime_s: u64,
    out: &mut ConsoleResponse,
) {
    let trimmed = line.trim();
    let result = if let Some(argument) = trimmed.strip_prefix("clock") {
        set_clock(argument, uptime_s, out)
    } else {
        run_shared(trimmed, controller, status::wall_clock(uptime_s), out)
    };
    if result.is_err() {
        out.clear();
        let _ = out.push_str("ERR response too long\r\n");
    }
}

fn set_clock(argument: &str, uptime_s: u64, out: &mut ConsoleResponse) -> core::fmt::Result {
    let argument = argument.trim();
    if argument.is_empty() {
        return write!(out, "clock={}\r\n", status::wall_clock(uptime_s));
    }
    match argument.parse::<Timestamp>() {
        Ok(epoch) => {
            status::set_wall_clock(epoch, uptime_s);
            write!(out, "clock={epoch}\r\n")
        }
        Err(_) => write!(out, "ERR usage: clock [<unix-seconds>]\r\n"),
    }
}

fn run_shared(
    line: &str,
    controller: &mut WateringController,
    now: Timestamp,
    out: &mut ConsoleResponse,
) -> core::fmt::Result {
    let mut body = ConsoleResponse::new();
    match console::execute(line, controller, now, &mut body) {
        Ok(CommandOutcome::Advance(_)) => {
            return write!(out, "ERR advance only runs in the simulator\r\n");
        }
        Ok(_) => {}
        Err(CommandError::Output) => return Err(core::fmt::Error),
        Err(error) => return write!(out, "ERR {error}\r\n"),
    }
    for response in body.lines() {
        write!(out, "{response}\r\n")?;
    }
    Ok(())
}

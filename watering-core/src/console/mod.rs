//! Operator console shared between firmware and simulator targets.
//!
//! [`grammar`] turns a line into a [`grammar::Command`]; [`commands`] applies
//! it to a controller and renders the response.

pub mod commands;
pub mod grammar;

pub use commands::{CommandError, CommandOutcome, execute};
pub use grammar::{Command, Keyword, ParseError, parse};

#![allow(clippy::module_name_repetitions)]

//! Line grammar for the operator console.
//!
//! Commands are short single lines, so the parser works directly on `&str`
//! with `winnow` combinators and never allocates. The leading keyword picks a
//! sub-parser; every sub-parser must consume the rest of the line.

use core::fmt;

use heapless::Vec;
use winnow::ascii::{dec_uint, space0, space1};
use winnow::combinator::{alt, eof, opt, preceded, separated_pair, terminated};
use winnow::error::{ContextError, ErrMode};
use winnow::ModalResult;
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

use crate::config::{ConfigKind, WateringWindow, WindowList};

/// Maximum `key=value` pairs accepted by one `set` command.
pub const MAX_ASSIGNMENTS: usize = 8;

/// Command keywords, also used as `help` topics.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Keyword {
    Trigger,
    Status,
    Config,
    Set,
    Windows,
    Advance,
    Log,
    Events,
    Help,
}

impl Keyword {
    pub const ALL: [Keyword; 9] = [
        Keyword::Trigger,
        Keyword::Status,
        Keyword::Config,
        Keyword::Set,
        Keyword::Windows,
        Keyword::Advance,
        Keyword::Log,
        Keyword::Events,
        Keyword::Help,
    ];

    /// Case-insensitive keyword lookup.
    #[must_use]
    pub fn lookup(word: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|keyword| keyword.name().eq_ignore_ascii_case(word))
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Keyword::Trigger => "trigger",
            Keyword::Status => "status",
            Keyword::Config => "config",
            Keyword::Set => "set",
            Keyword::Windows => "windows",
            Keyword::Advance => "advance",
            Keyword::Log => "log",
            Keyword::Events => "events",
            Keyword::Help => "help",
        }
    }

    #[must_use]
    pub const fn usage(self) -> &'static str {
        match self {
            Keyword::Trigger => "trigger",
            Keyword::Status => "status",
            Keyword::Config => "config [control|hw]",
            Keyword::Set => "set <control|hw> key=value [key=value ...]",
            Keyword::Windows => "windows HH:MM-HH:MM [HH:MM-HH:MM ...] (up to 8)",
            Keyword::Advance => "advance <count>[s|m|h|d]",
            Keyword::Log => "log [count]",
            Keyword::Events => "events",
            Keyword::Help => "help [command]",
        }
    }

    #[must_use]
    pub const fn summary(self) -> &'static str {
        match self {
            Keyword::Trigger => "request one watering cycle",
            Keyword::Status => "show sequencer and scheduler state",
            Keyword::Config => "print the active configuration",
            Keyword::Set => "change configuration fields",
            Keyword::Windows => "replace the daily watering windows",
            Keyword::Advance => "advance simulated time",
            Keyword::Log => "show recent telemetry",
            Keyword::Events => "list doses inside the trailing window",
            Keyword::Help => "list commands or describe one",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Single `key=value` pair from a `set` command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Assignment<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

/// Assignments carried by one `set` command.
pub type Assignments<'a> = Vec<Assignment<'a>, MAX_ASSIGNMENTS>;

/// Parsed console command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Trigger,
    Status,
    Config(Option<ConfigKind>),
    Set {
        kind: ConfigKind,
        assignments: Assignments<'a>,
    },
    Windows(WindowList),
    /// Seconds to advance.
    Advance(u64),
    Log(Option<u16>),
    Events,
    Help(Option<Keyword>),
}

/// Why a line failed to parse.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ParseErrorKind {
    Empty,
    UnknownCommand,
    UnknownTopic,
    /// Arguments did not match the command's usage.
    Usage(Keyword),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ParseError<'a> {
    pub line: &'a str,
    /// Byte offset at which parsing stopped.
    pub offset: usize,
    pub kind: ParseErrorKind,
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rest = self.line.get(self.offset..).unwrap_or("").trim();
        match self.kind {
            ParseErrorKind::Empty => f.write_str("empty command"),
            ParseErrorKind::UnknownCommand => write!(f, "unknown command `{rest}`"),
            ParseErrorKind::UnknownTopic => write!(f, "no help for `{rest}`"),
            ParseErrorKind::Usage(keyword) => {
                if rest.is_empty() {
                    write!(f, "usage: {}", keyword.usage())
                } else {
                    write!(f, "unexpected `{rest}`; usage: {}", keyword.usage())
                }
            }
        }
    }
}

/// Parses one console line.
///
/// # Errors
///
/// Returns a [`ParseError`] pointing at the first byte that could not be
/// consumed.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let leading = line.len() - line.trim_start().len();
    let mut input = line.trim();
    let error = |input: &str, kind| ParseError {
        line,
        offset: leading + (line.trim().len() - input.len()),
        kind,
    };

    if input.is_empty() {
        return Err(error(input, ParseErrorKind::Empty));
    }

    let keyword = match word.parse_next(&mut input).ok().and_then(Keyword::lookup) {
        Some(keyword) => keyword,
        None => return Err(error(line.trim(), ParseErrorKind::UnknownCommand)),
    };

    let rest = input;
    let parsed = match keyword {
        Keyword::Trigger => end.value(Command::Trigger).parse_next(&mut input),
        Keyword::Status => end.value(Command::Status).parse_next(&mut input),
        Keyword::Events => end.value(Command::Events).parse_next(&mut input),
        Keyword::Config => terminated(opt(preceded(space1, config_kind)), end)
            .map(Command::Config)
            .parse_next(&mut input),
        Keyword::Set => set_command.parse_next(&mut input),
        Keyword::Windows => terminated(window_list, end)
            .map(Command::Windows)
            .parse_next(&mut input),
        Keyword::Advance => terminated(preceded(space1, duration_secs), end)
            .map(Command::Advance)
            .parse_next(&mut input),
        Keyword::Log => terminated(opt(preceded(space1, dec_uint)), end)
            .map(Command::Log)
            .parse_next(&mut input),
        Keyword::Help => {
            let topic = terminated(opt(preceded(space1, word)), end).parse_next(&mut input);
            return match topic {
                Ok(None) => Ok(Command::Help(None)),
                Ok(Some(name)) => Keyword::lookup(name)
                    .map(|topic| Command::Help(Some(topic)))
                    .ok_or_else(|| error(rest.trim_start(), ParseErrorKind::UnknownTopic)),
                Err(_) => Err(error(rest, ParseErrorKind::Usage(Keyword::Help))),
            };
        }
    };

    parsed.map_err(|_| error(rest, ParseErrorKind::Usage(keyword)))
}

fn word<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        .parse_next(input)
}

fn end(input: &mut &str) -> ModalResult<()> {
    (space0, eof).void().parse_next(input)
}

fn config_kind(input: &mut &str) -> ModalResult<ConfigKind> {
    alt((
        "control".value(ConfigKind::Control),
        alt(("hardware", "hw")).value(ConfigKind::Hardware),
    ))
    .parse_next(input)
}

fn assignment<'a>(input: &mut &'a str) -> ModalResult<Assignment<'a>> {
    separated_pair(
        take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
        '=',
        take_while(1.., |c: char| !c.is_whitespace()),
    )
    .map(|(key, value)| Assignment { key, value })
    .parse_next(input)
}

fn set_command<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    let kind = preceded(space1, config_kind).parse_next(input)?;
    let mut assignments = Assignments::new();
    loop {
        if end.parse_next(&mut &**input).is_ok() && !assignments.is_empty() {
            end.parse_next(input)?;
            return Ok(Command::Set { kind, assignments });
        }
        let pair = preceded(space1, assignment).parse_next(input)?;
        if assignments.push(pair).is_err() {
            return Err(ErrMode::Cut(ContextError::new()));
        }
    }
}

/// `HH:MM` or `HH:MM:SS` as seconds since midnight.
fn clock(input: &mut &str) -> ModalResult<u32> {
    (
        separated_pair(dec_uint::<_, u32, _>, ':', dec_uint::<_, u32, _>),
        opt(preceded(':', dec_uint::<_, u32, _>)),
    )
        .verify(|((hours, minutes), seconds): &((u32, u32), Option<u32>)| {
            *hours < 24 && *minutes < 60 && seconds.unwrap_or(0) < 60
        })
        .map(|((hours, minutes), seconds)| hours * 3_600 + minutes * 60 + seconds.unwrap_or(0))
        .parse_next(input)
}

fn window(input: &mut &str) -> ModalResult<WateringWindow> {
    separated_pair(clock, '-', clock)
        .map(|(start, end)| WateringWindow::new(start, end))
        .parse_next(input)
}

fn window_list(input: &mut &str) -> ModalResult<WindowList> {
    let mut windows = WindowList::new();
    loop {
        let parsed = opt(preceded(space1, window)).parse_next(input)?;
        match parsed {
            Some(next) => {
                if windows.push(next).is_err() {
                    return Err(ErrMode::Cut(ContextError::new()));
                }
            }
            None if windows.is_empty() => return Err(ErrMode::Backtrack(ContextError::new())),
            None => return Ok(windows),
        }
    }
}

fn duration_secs(input: &mut &str) -> ModalResult<u64> {
    (dec_uint::<_, u64, _>, opt(one_of(['s', 'm', 'h', 'd'])))
        .map(|(count, unit)| {
            let scale = match unit {
                Some('m') => 60,
                Some('h') => 3_600,
                Some('d') => 86_400,
                _ => 1,
            };
            count.saturating_mul(scale)
        })
        .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_commands_case_insensitively() {
        assert_eq!(parse("trigger"), Ok(Command::Trigger));
        assert_eq!(parse("  STATUS  "), Ok(Command::Status));
        assert_eq!(parse("events"), Ok(Command::Events));
        assert_eq!(parse("config hw"), Ok(Command::Config(Some(ConfigKind::Hardware))));
        assert_eq!(parse("config"), Ok(Command::Config(None)));
    }

    #[test]
    fn parses_set_assignments() {
        let command = parse("set control kp=0.5 deadtime_sec=900").expect("valid set");
        let Command::Set { kind, assignments } = command else {
            panic!("expected set command");
        };
        assert_eq!(kind, ConfigKind::Control);
        assert_eq!(
            assignments.as_slice(),
            &[
                Assignment {
                    key: "kp",
                    value: "0.5"
                },
                Assignment {
                    key: "deadtime_sec",
                    value: "900"
                },
            ]
        );
    }

    #[test]
    fn set_requires_at_least_one_assignment() {
        let error = parse("set hw").expect_err("missing assignments");
        assert_eq!(error.kind, ParseErrorKind::Usage(Keyword::Set));
    }

    #[test]
    fn parses_window_lists() {
        let Ok(Command::Windows(windows)) = parse("windows 09:00-09:15 19:00-21:00:30") else {
            panic!("expected windows command");
        };
        assert_eq!(
            windows.as_slice(),
            &[
                WateringWindow::new(32_400, 33_300),
                WateringWindow::new(68_400, 75_630),
            ]
        );
    }

    #[test]
    fn rejects_impossible_clock_values() {
        let error = parse("windows 25:00-26:00").expect_err("bad clock");
        assert_eq!(error.kind, ParseErrorKind::Usage(Keyword::Windows));
    }

    #[test]
    fn advance_understands_units() {
        assert_eq!(parse("advance 90"), Ok(Command::Advance(90)));
        assert_eq!(parse("advance 15m"), Ok(Command::Advance(900)));
        assert_eq!(parse("advance 2d"), Ok(Command::Advance(172_800)));
    }

    #[test]
    fn help_topics_must_exist() {
        assert_eq!(parse("help set"), Ok(Command::Help(Some(Keyword::Set))));
        assert_eq!(parse("help"), Ok(Command::Help(None)));
        let error = parse("help flux").expect_err("unknown topic");
        assert_eq!(error.kind, ParseErrorKind::UnknownTopic);
    }

    #[test]
    fn reports_unknown_commands_and_trailing_input() {
        let error = parse("water now").expect_err("unknown");
        assert_eq!(error.kind, ParseErrorKind::UnknownCommand);

        let error = parse("status please").expect_err("trailing input");
        assert_eq!(error.kind, ParseErrorKind::Usage(Keyword::Status));
        assert_eq!(&error.line[error.offset..], " please");
    }
}

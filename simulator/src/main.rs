mod session;
mod sim;
mod store;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use session::{Session, SessionOptions, format_clock};
use watering_core::SECONDS_PER_DAY;

const USAGE: &str = "Usage: watering-simulator [--days <n>] [--step <seconds>] [--start <epoch>] \
                     [--store <path>] [--transcript <path>]";

/// 2023-11-15 00:00 UTC.
const DEFAULT_START: u64 = 19_676 * SECONDS_PER_DAY;

struct Args {
    options: SessionOptions,
    batch_days: Option<u64>,
}

fn main() -> io::Result<()> {
    let args = parse_args(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdout = io::stdout();
    let mut writer = stdout.lock();

    if let Some(days) = args.batch_days {
        for summary in sim::run_batch(args.options, days)? {
            writeln!(writer, "{summary}")?;
        }
        return Ok(());
    }

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut session = Session::new(args.options)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Watering controller simulator ready at {}. Type `help` for commands or `exit` to quit.",
        format_clock(session.clock())
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args {
        options: SessionOptions {
            start: DEFAULT_START,
            tick_seconds: 1,
            store_path: None,
            transcript_path: None,
        },
        batch_days: None,
    };

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--days" => parsed.batch_days = Some(parse_number("--days", &value()?)?),
            "--step" => parsed.options.tick_seconds = parse_number("--step", &value()?)?.max(1),
            "--start" => parsed.options.start = parse_number("--start", &value()?)?,
            "--store" => parsed.options.store_path = Some(PathBuf::from(value()?)),
            "--transcript" => parsed.options.transcript_path = Some(PathBuf::from(value()?)),
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    Ok(parsed)
}

fn parse_number(flag: &str, value: &str) -> Result<u64, String> {
    value
        .parse()
        .map_err(|_| format!("{flag} expects a whole number, got `{value}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|arg| (*arg).to_string()))
    }

    #[test]
    fn defaults_to_interactive_one_second_ticks() {
        let parsed = args(&[]).expect("no arguments");
        assert_eq!(parsed.batch_days, None);
        assert_eq!(parsed.options.tick_seconds, 1);
        assert_eq!(parsed.options.start, DEFAULT_START);
    }

    #[test]
    fn accepts_split_and_inline_values() {
        let parsed = args(&["--days", "7", "--step=60", "--store", "events.log"]).expect("valid");
        assert_eq!(parsed.batch_days, Some(7));
        assert_eq!(parsed.options.tick_seconds, 60);
        assert_eq!(parsed.options.store_path, Some(PathBuf::from("events.log")));
    }

    #[test]
    fn rejects_missing_or_bad_values() {
        assert_eq!(
            args(&["--days"]).err(),
            Some("Expected value after --days".to_string())
        );
        assert!(args(&["--step", "fast"]).is_err());
        assert!(args(&["--verbose"]).is_err());
    }
}

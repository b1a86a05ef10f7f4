use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;

use watering_core::Timestamp;
use watering_core::schedule::{EventHistory, EventStore};

/// Event store backed by a text file with one timestamp per line.
///
/// Without a path the store keeps the log in memory only, which mirrors a
/// board without flash.
pub struct HostEventStore {
    path: Option<PathBuf>,
    memory: EventHistory,
}

impl HostEventStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            memory: EventHistory::new(),
        }
    }
}

impl EventStore for HostEventStore {
    type Error = io::Error;

    fn load(&mut self) -> Result<EventHistory, Self::Error> {
        let Some(path) = &self.path else {
            return Ok(self.memory.clone());
        };

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(EventHistory::new()),
            Err(error) => return Err(error),
        };

        let mut history = EventHistory::new();
        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let timestamp = line.parse::<Timestamp>().map_err(|error| {
                io::Error::new(
                    ErrorKind::InvalidData,
                    format!("{}:{}: {error}", path.display(), number + 1),
                )
            })?;
            history.push(timestamp).map_err(|_| {
                io::Error::new(ErrorKind::InvalidData, "event log file exceeds capacity")
            })?;
        }
        self.memory.clone_from(&history);
        Ok(history)
    }

    fn store(&mut self, events: &[Timestamp]) -> Result<(), Self::Error> {
        self.memory.clear();
        // Callers hand back at most one log's worth of entries.
        let _ = self.memory.extend_from_slice(events);

        let Some(path) = &self.path else {
            return Ok(());
        };

        let staging = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&staging)?;
            for timestamp in events {
                writeln!(file, "{timestamp}")?;
            }
            file.sync_all()?;
        }
        fs::rename(staging, path)
    }
}

//! Trigger sources and the per-tick inbox they feed.
//!
//! Every source (the scheduler, the front-panel button, a remote request, the
//! operator console) pushes a tagged [`TriggerRequest`]. The controller drains
//! the inbox once per tick and offers each request to the sequencer in arrival
//! order.

use core::fmt;

use heapless::Deque;

use crate::Timestamp;

/// Default inbox depth; a handful of sources can fire in the same tick.
pub const TRIGGER_INBOX_DEPTH: usize = 4;

/// Origin of a watering request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TriggerSource {
    Scheduler,
    Button,
    Remote,
    Console,
}

impl TriggerSource {
    /// Encodes the source for compact status words.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            TriggerSource::Scheduler => 0,
            TriggerSource::Button => 1,
            TriggerSource::Remote => 2,
            TriggerSource::Console => 3,
        }
    }

    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(TriggerSource::Scheduler),
            1 => Some(TriggerSource::Button),
            2 => Some(TriggerSource::Remote),
            3 => Some(TriggerSource::Console),
            _ => None,
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerSource::Scheduler => "scheduler",
            TriggerSource::Button => "button",
            TriggerSource::Remote => "remote",
            TriggerSource::Console => "console",
        })
    }
}

/// Request to run one watering cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TriggerRequest {
    pub source: TriggerSource,
    pub requested_at: Timestamp,
}

impl TriggerRequest {
    #[must_use]
    pub const fn new(source: TriggerSource, requested_at: Timestamp) -> Self {
        Self {
            source,
            requested_at,
        }
    }
}

/// Errors surfaced when submitting a trigger.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InboxError {
    /// Inbox already holds the maximum number of pending requests.
    Full(TriggerRequest),
}

impl fmt::Display for InboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InboxError::Full(request) => {
                write!(f, "trigger inbox full, dropped {} request", request.source)
            }
        }
    }
}

/// Bounded FIFO of pending trigger requests.
#[derive(Debug)]
pub struct TriggerInbox<const N: usize = TRIGGER_INBOX_DEPTH> {
    queue: Deque<TriggerRequest, N>,
}

impl<const N: usize> TriggerInbox<N> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Deque::new(),
        }
    }

    /// Queues `request` behind any requests already pending.
    pub fn push(&mut self, request: TriggerRequest) -> Result<(), InboxError> {
        self.queue.push_back(request).map_err(InboxError::Full)
    }

    /// Removes the oldest pending request.
    pub fn pop(&mut self) -> Option<TriggerRequest> {
        self.queue.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for TriggerInbox<N> {
    fn default() -> Self {
        Self::new()
    }
}

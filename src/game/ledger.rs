//! Guess ledger: pending guesses per guess kind.
//!
//! Each kind ("items", or one extra family) owns a FIFO queue. Recording a
//! guess lazily drops entries past the staleness window and any earlier entry
//! from the same user, then appends. Nothing sweeps the queues in the
//! background, so an idle queue may hold stale entries until the next write.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use log::trace;

use super::extra::Assignment;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GuessKind {
    Items,
    Family(String),
}

impl fmt::Display for GuessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuessKind::Items => write!(f, "items"),
            GuessKind::Family(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessPayload {
    Item(String),
    Assignment(Assignment),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingGuess {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub username: String,
    pub payload: GuessPayload,
}

impl PendingGuess {
    /// Still inside the staleness window at `now`.
    pub fn is_live(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        self.timestamp >= now - stale_after
    }
}

#[derive(Debug, Default)]
pub struct GuessLedger {
    queues: HashMap<GuessKind, Vec<PendingGuess>>,
}

impl GuessLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `guess`, superseding the user's previous guess of this kind.
    /// Returns the queue length after the insert.
    pub fn record(
        &mut self,
        kind: GuessKind,
        guess: PendingGuess,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> usize {
        let queue = self.queues.entry(kind).or_default();
        let before = queue.len();
        queue.retain(|g| g.is_live(now, stale_after) && g.user_id != guess.user_id);
        trace!("Dropped {} stale or superseded guesses", before - queue.len());
        queue.push(guess);
        queue.len()
    }

    pub fn queue(&self, kind: &GuessKind) -> &[PendingGuess] {
        self.queues.get(kind).map(|q| q.as_slice()).unwrap_or(&[])
    }

    /// Remove and return a kind's queue in arrival order.
    pub fn take(&mut self, kind: &GuessKind) -> Vec<PendingGuess> {
        self.queues.remove(kind).unwrap_or_default()
    }

    pub fn replace(&mut self, kind: GuessKind, queue: Vec<PendingGuess>) {
        if queue.is_empty() {
            self.queues.remove(&kind);
        } else {
            self.queues.insert(kind, queue);
        }
    }

    pub fn clear(&mut self) {
        self.queues.clear();
    }

    /// Pending guesses across every kind.
    pub fn len(&self) -> usize {
        self.queues.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.values().all(Vec::is_empty)
    }
}

//! Process-wide game counters.
//!
//! Global totals are plain atomics; per-channel counters sit behind a mutex.
//! Both are in-memory only and reset when the process restarts.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

static GUESSES_RECORDED: AtomicU64 = AtomicU64::new(0);
static GUESSES_REJECTED: AtomicU64 = AtomicU64::new(0);
static REVEALS_SCORED: AtomicU64 = AtomicU64::new(0);
static FAMILIES_COMPLETED: AtomicU64 = AtomicU64::new(0);
static POINTS_AWARDED: AtomicU64 = AtomicU64::new(0);
static SESSIONS_FINISHED: AtomicU64 = AtomicU64::new(0);

static CHANNEL_COUNTERS: OnceLock<Mutex<HashMap<String, ChannelCounter>>> = OnceLock::new();

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCounter {
    pub guesses: u64,
    pub reveals: u64,
    pub points_awarded: u64,
    pub sessions: u64,
}

fn channel_counter_lock() -> MutexGuard<'static, HashMap<String, ChannelCounter>> {
    CHANNEL_COUNTERS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn with_channel<F: FnOnce(&mut ChannelCounter)>(channel_id: &str, f: F) -> ChannelCounter {
    let mut guard = channel_counter_lock();
    let counter = guard.entry(channel_id.to_string()).or_default();
    f(counter);
    *counter
}

pub fn record_guess(channel_id: &str) -> ChannelCounter {
    GUESSES_RECORDED.fetch_add(1, Ordering::Relaxed);
    with_channel(channel_id, |c| c.guesses = c.guesses.saturating_add(1))
}

pub fn record_rejected_guess() {
    GUESSES_REJECTED.fetch_add(1, Ordering::Relaxed);
}

/// A single-item reveal or a completed extra family that paid `points` in total.
pub fn record_scoring(channel_id: &str, family: bool, points: u32) -> ChannelCounter {
    if family {
        FAMILIES_COMPLETED.fetch_add(1, Ordering::Relaxed);
    } else {
        REVEALS_SCORED.fetch_add(1, Ordering::Relaxed);
    }
    POINTS_AWARDED.fetch_add(u64::from(points), Ordering::Relaxed);
    with_channel(channel_id, |c| {
        c.reveals = c.reveals.saturating_add(1);
        c.points_awarded = c.points_awarded.saturating_add(u64::from(points));
    })
}

pub fn record_session_finished(channel_id: &str) -> ChannelCounter {
    SESSIONS_FINISHED.fetch_add(1, Ordering::Relaxed);
    with_channel(channel_id, |c| c.sessions = c.sessions.saturating_add(1))
}

pub fn channel_counters_snapshot() -> HashMap<String, ChannelCounter> {
    channel_counter_lock().clone()
}

#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub guesses_recorded: u64,
    pub guesses_rejected: u64,
    pub reveals_scored: u64,
    pub families_completed: u64,
    pub points_awarded: u64,
    pub sessions_finished: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        guesses_recorded: GUESSES_RECORDED.load(Ordering::Relaxed),
        guesses_rejected: GUESSES_REJECTED.load(Ordering::Relaxed),
        reveals_scored: REVEALS_SCORED.load(Ordering::Relaxed),
        families_completed: FAMILIES_COMPLETED.load(Ordering::Relaxed),
        points_awarded: POINTS_AWARDED.load(Ordering::Relaxed),
        sessions_finished: SESSIONS_FINISHED.load(Ordering::Relaxed),
    }
}

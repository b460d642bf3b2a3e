//! Lightweight global metrics for autosave.
//!
//! Потокобезопасные атомарные счётчики, общие для всех сессий процесса:
//! - жизненный цикл сессий (started/stopped)
//! - циклы воркера (wake cycles, обнаруженные изменения)
//! - запись на диск (ok/failed, байты)
//! - bulk lock (сколько раз замораживали все буферы)
//!
//! Per-session counters live in `session::SessionStats`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// ----- Sessions -----
static SESSIONS_STARTED: AtomicU64 = AtomicU64::new(0);
static SESSIONS_STOPPED: AtomicU64 = AtomicU64::new(0);

// ----- Worker -----
static WAKE_CYCLES: AtomicU64 = AtomicU64::new(0);
static CHANGES_DETECTED: AtomicU64 = AtomicU64::new(0);

// ----- Disk -----
static WRITES_OK: AtomicU64 = AtomicU64::new(0);
static WRITES_FAILED: AtomicU64 = AtomicU64::new(0);
static BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);

// ----- Coordination -----
static BULK_LOCKS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub sessions_started: u64,
    pub sessions_stopped: u64,

    pub wake_cycles: u64,
    pub changes_detected: u64,

    pub writes_ok: u64,
    pub writes_failed: u64,
    pub bytes_written: u64,

    pub bulk_locks: u64,
}

impl MetricsSnapshot {
    pub fn sessions_active(&self) -> u64 {
        self.sessions_started.saturating_sub(self.sessions_stopped)
    }

    /// Fraction of wake cycles that found a change.
    pub fn change_ratio(&self) -> f64 {
        if self.wake_cycles == 0 {
            0.0
        } else {
            self.changes_detected as f64 / self.wake_cycles as f64
        }
    }
}

// ----- Recorders -----
pub fn record_session_started() {
    SESSIONS_STARTED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_session_stopped() {
    SESSIONS_STOPPED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_wake_cycle(changed: bool) {
    WAKE_CYCLES.fetch_add(1, Ordering::Relaxed);
    if changed {
        CHANGES_DETECTED.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_write_ok(bytes: usize) {
    WRITES_OK.fetch_add(1, Ordering::Relaxed);
    BYTES_WRITTEN.fetch_add(bytes as u64, Ordering::Relaxed);
}

pub fn record_write_failed() {
    WRITES_FAILED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_bulk_lock() {
    BULK_LOCKS.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        sessions_started: SESSIONS_STARTED.load(Ordering::Relaxed),
        sessions_stopped: SESSIONS_STOPPED.load(Ordering::Relaxed),

        wake_cycles: WAKE_CYCLES.load(Ordering::Relaxed),
        changes_detected: CHANGES_DETECTED.load(Ordering::Relaxed),

        writes_ok: WRITES_OK.load(Ordering::Relaxed),
        writes_failed: WRITES_FAILED.load(Ordering::Relaxed),
        bytes_written: BYTES_WRITTEN.load(Ordering::Relaxed),

        bulk_locks: BULK_LOCKS.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    SESSIONS_STARTED.store(0, Ordering::Relaxed);
    SESSIONS_STOPPED.store(0, Ordering::Relaxed);

    WAKE_CYCLES.store(0, Ordering::Relaxed);
    CHANGES_DETECTED.store(0, Ordering::Relaxed);

    WRITES_OK.store(0, Ordering::Relaxed);
    WRITES_FAILED.store(0, Ordering::Relaxed);
    BYTES_WRITTEN.store(0, Ordering::Relaxed);

    BULK_LOCKS.store(0, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_ratios() {
        let m = MetricsSnapshot {
            sessions_started: 3,
            sessions_stopped: 1,
            wake_cycles: 8,
            changes_detected: 2,
            ..Default::default()
        };
        assert_eq!(m.sessions_active(), 2);
        assert!((m.change_ratio() - 0.25).abs() < 1e-9);

        // без циклов деления на ноль нет
        assert_eq!(MetricsSnapshot::default().change_ratio(), 0.0);
    }
}

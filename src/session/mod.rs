//! Autosave sessions: one live buffer, one save file, one worker thread.
//!
//! Layout:
//! - handle.rs  - Session (create / shutdown / Drop), destroy()
//! - worker.rs  - thread body: diff, conditional write, timed wait
//! - persist.rs - flat save file I/O (write_snapshot, load_into)
//!
//! Locks per session (two, never merged):
//! - `snapshot` (BufferLock) - snapshot bytes + worker reads of the live buffer;
//!   this is what Registry::lock_all freezes.
//! - `wait` (Mutex<WaitState>) + `wake` (Condvar) - sleep/wake signaling only.
//!   A bulk freeze therefore never blocks shutdown signaling.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::buffer::SaveSource;
use crate::lock::BufferLock;

pub mod handle;
pub mod persist;
mod worker;

pub use handle::{destroy, Session};

/// Sleep/wake state, guarded by the wait lock.
#[derive(Default)]
pub(crate) struct WaitState {
    /// false -> true exactly once (shutdown), never reset.
    pub(crate) quit: bool,
    /// One-shot early wake request (Session::nudge).
    pub(crate) nudged: bool,
}

/// State shared between the handle, the worker and the registry.
pub(crate) struct SessionInner {
    pub(crate) path: PathBuf,
    pub(crate) interval: Duration,
    pub(crate) sync_data: bool,
    pub(crate) source: Arc<dyn SaveSource>,

    /// Last contents handed to the disk writer.
    pub(crate) snapshot: BufferLock<Vec<u8>>,

    /// Advisory mirror of WaitState::quit, peeked without the wait lock.
    pub(crate) quit_hint: AtomicBool,
    pub(crate) wait: Mutex<WaitState>,
    pub(crate) wake: Condvar,

    pub(crate) stats: StatsCounters,
}

impl SessionInner {
    pub(crate) fn wait_state(&self) -> MutexGuard<'_, WaitState> {
        self.wait.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn size(&self) -> usize {
        self.source.len()
    }
}

/// Per-session counters (see also crate::metrics for process-wide totals).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Completed diff passes.
    pub wake_cycles: u64,
    /// Passes that found the live buffer different from the snapshot.
    pub changes_detected: u64,
    pub writes_ok: u64,
    pub writes_failed: u64,
    pub bytes_written: u64,
}

impl SessionStats {
    /// Write attempts, successful or not.
    pub fn writes_attempted(&self) -> u64 {
        self.writes_ok + self.writes_failed
    }
}

#[derive(Default)]
pub(crate) struct StatsCounters {
    wake_cycles: AtomicU64,
    changes_detected: AtomicU64,
    writes_ok: AtomicU64,
    writes_failed: AtomicU64,
    bytes_written: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_cycle(&self, changed: bool) {
        self.wake_cycles.fetch_add(1, Ordering::Relaxed);
        if changed {
            self.changes_detected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_write_ok(&self, bytes: usize) {
        self.writes_ok.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_write_failed(&self) {
        self.writes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SessionStats {
        SessionStats {
            wake_cycles: self.wake_cycles.load(Ordering::Relaxed),
            changes_detected: self.changes_detected.load(Ordering::Relaxed),
            writes_ok: self.writes_ok.load(Ordering::Relaxed),
            writes_failed: self.writes_failed.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

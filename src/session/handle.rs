//! Session handle: creation, shutdown, Drop.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{worker, SessionInner, SessionStats, StatsCounters, WaitState};
use crate::buffer::SaveSource;
use crate::config::{AutosaveConfig, DEFAULT_THREAD_NAME};
use crate::error::AutosaveError;
use crate::lock::{BufferLock, BufferLockGuard};
use crate::metrics;
use crate::registry::{Registration, Registry};

/// Creation parameters that are not the path or the buffer.
#[derive(Clone, Debug)]
pub(crate) struct SessionOptions {
    pub(crate) interval: Duration,
    pub(crate) sync_data: bool,
    pub(crate) thread_name: String,
}

impl SessionOptions {
    pub(crate) fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            sync_data: false,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    pub(crate) fn from_config(cfg: &AutosaveConfig) -> Self {
        Self {
            interval: cfg.interval(),
            sync_data: cfg.sync_data,
            thread_name: cfg.thread_name.clone(),
        }
    }
}

/// A running autosave: owns the worker thread and the snapshot, borrows
/// (shares) the live buffer.
///
/// Dropping the handle stops the worker and waits for it.
pub struct Session {
    inner: Arc<SessionInner>,
    worker: Option<JoinHandle<()>>,
    registration: Option<Registration>,
}

impl Session {
    /// Start autosaving `source` to `path`, checking every `interval`.
    ///
    /// `source` is shared, not copied: keep your own clone and mutate it.
    /// The snapshot starts equal to the current contents, so nothing is
    /// written until the buffer changes.
    pub fn new<S>(path: impl Into<PathBuf>, source: S, interval: Duration) -> Result<Session>
    where
        S: SaveSource + 'static,
    {
        Self::create(
            path.into(),
            Arc::new(source),
            SessionOptions::with_interval(interval),
            None,
        )
    }

    /// Same as `new`, with interval / fsync / thread name taken from `cfg`.
    pub fn with_config<S>(path: impl Into<PathBuf>, source: S, cfg: &AutosaveConfig) -> Result<Session>
    where
        S: SaveSource + 'static,
    {
        Self::create(
            path.into(),
            Arc::new(source),
            SessionOptions::from_config(cfg),
            None,
        )
    }

    pub(crate) fn create(
        path: PathBuf,
        source: Arc<dyn SaveSource>,
        opts: SessionOptions,
        registry: Option<&Registry>,
    ) -> Result<Session> {
        if opts.interval.is_zero() {
            return Err(AutosaveError::InvalidInterval.into());
        }

        let size = source.len();
        let snapshot = alloc_bytes(size)?;
        let scratch = alloc_bytes(size)?;

        let inner = Arc::new(SessionInner {
            path,
            interval: opts.interval,
            sync_data: opts.sync_data,
            source,
            snapshot: BufferLock::new(snapshot),
            quit_hint: AtomicBool::new(false),
            wait: Mutex::new(WaitState::default()),
            wake: Condvar::new(),
            stats: StatsCounters::default(),
        });

        // Начальный снапшот = текущее содержимое, первый diff осмыслен.
        inner.snapshot.with(|snap| inner.source.copy_to(snap));

        let name = thread_name(&opts.thread_name, &inner.path);
        let worker = {
            let inner = inner.clone();
            thread::Builder::new()
                .name(name)
                .spawn(move || worker::run(inner, scratch))
        }
        .map_err(|e| AutosaveError::ThreadSpawnFailure(e.to_string()))
        .with_context(|| format!("autosave {}", inner.path.display()))?;

        metrics::record_session_started();
        let registration = registry.map(|r| r.register(&inner));
        debug!(
            "autosave session started: path={} size={} interval={:?}",
            inner.path.display(),
            size,
            inner.interval
        );

        Ok(Session {
            inner,
            worker: Some(worker),
            registration,
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Size of the live buffer (and of the snapshot / save file).
    pub fn len(&self) -> usize {
        self.inner.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().map_or(false, |w| !w.is_finished())
    }

    pub fn stats(&self) -> SessionStats {
        self.inner.stats.snapshot()
    }

    /// Copy of the snapshot as the worker last saw it.
    pub fn snapshot(&self) -> Vec<u8> {
        self.inner.snapshot.with(|snap| snap.clone())
    }

    /// Wake the worker for one extra cycle without waiting out the interval.
    pub fn nudge(&self) {
        let mut st = self.inner.wait_state();
        st.nudged = true;
        drop(st);
        self.inner.wake.notify_one();
    }

    /// Freeze this session's diff/copy step until the guard is dropped.
    ///
    /// Do not call `shutdown` (or drop the session) while holding it: the
    /// worker may be parked behind the lock and the join never returns.
    pub fn lock(&self) -> BufferLockGuard<'_, Vec<u8>> {
        self.inner.snapshot.lock()
    }

    /// Signal quit, wake the worker and join it. Idempotent.
    ///
    /// Returns within roughly one diff pass (plus an in-flight write): the
    /// timed wait is interrupted, no final save is made.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        if let Some(reg) = self.registration.take() {
            reg.cancel();
        }

        {
            let mut st = self.inner.wait_state();
            st.quit = true;
            self.inner.quit_hint.store(true, Ordering::Relaxed);
        }
        self.inner.wake.notify_one();

        if worker.join().is_err() {
            warn!(
                "autosave worker for {} panicked",
                self.inner.path.display()
            );
        }
        metrics::record_session_stopped();
        debug!("autosave session stopped: {}", self.inner.path.display());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Destroy the session in `slot`, leaving `None`. A `None` slot is a no-op,
/// so calling this twice is safe.
pub fn destroy(slot: &mut Option<Session>) {
    if let Some(mut s) = slot.take() {
        s.shutdown();
    }
}

fn alloc_bytes(size: usize) -> Result<Vec<u8>> {
    let mut v: Vec<u8> = Vec::new();
    v.try_reserve_exact(size)
        .map_err(|_| AutosaveError::AllocationFailure { size })?;
    v.resize(size, 0);
    Ok(v)
}

fn thread_name(prefix: &str, path: &Path) -> String {
    match path.file_name() {
        Some(f) => format!("{}:{}", prefix, f.to_string_lossy()),
        None => prefix.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_name_uses_file_name() {
        assert_eq!(
            thread_name("autosave", Path::new("/saves/zelda.srm")),
            "autosave:zelda.srm"
        );
        assert_eq!(thread_name("autosave", Path::new("/")), "autosave");
    }

    #[test]
    fn alloc_bytes_zeroed() {
        let v = alloc_bytes(16).unwrap();
        assert_eq!(v.len(), 16);
        assert!(v.iter().all(|&b| b == 0));
    }

    #[test]
    fn huge_allocation_is_reported() {
        let err = alloc_bytes(usize::MAX).unwrap_err();
        assert_eq!(
            err.downcast_ref::<AutosaveError>(),
            Some(&AutosaveError::AllocationFailure { size: usize::MAX })
        );
    }
}

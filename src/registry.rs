//! Registry of live autosave sessions + bulk freeze.
//!
//! Назначение:
//! - Код снаружи (save state / load state, сериализация SRAM) должен на время
//!   заморозить все воркеры, чтобы ни один diff/copy не шёл параллельно.
//! - Registry::lock_all() захватывает buffer lock каждой живой сессии
//!   (в порядке регистрации), BulkLock::unlock()/Drop - отпускает.
//!
//! Правила:
//! - Registry создаётся явно (Registry::new()) и живёт столько, сколько решит
//!   приложение; глобального синглтона нет.
//! - Реестр не владеет сессиями: хранит Weak. Сессия, созданная через реестр,
//!   удаляет свою запись при shutdown; мёртвые Weak просто пропускаются.
//! - Повторный lock_all на том же потоке без unlock - дедлок (контракт
//!   вызывающей стороны, не проверяется). То же для shutdown сессии, пока её
//!   держит BulkLock.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::buffer::SaveSource;
use crate::config::AutosaveConfig;
use crate::metrics;
use crate::session::handle::SessionOptions;
use crate::session::{Session, SessionInner};

#[derive(Default)]
struct Slots {
    next_id: u64,
    entries: BTreeMap<u64, Weak<SessionInner>>,
}

#[derive(Default)]
struct RegistryInner {
    slots: Mutex<Slots>,
}

impl RegistryInner {
    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-scoped set of sessions that can be frozen together.
/// Clones refer to the same registry.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session and register it here.
    pub fn spawn<S>(&self, path: impl Into<PathBuf>, source: S, interval: Duration) -> Result<Session>
    where
        S: SaveSource + 'static,
    {
        Session::create(
            path.into(),
            Arc::new(source),
            SessionOptions::with_interval(interval),
            Some(self),
        )
    }

    /// Start a session with `cfg` and register it here.
    pub fn spawn_with_config<S>(
        &self,
        path: impl Into<PathBuf>,
        source: S,
        cfg: &AutosaveConfig,
    ) -> Result<Session>
    where
        S: SaveSource + 'static,
    {
        Session::create(
            path.into(),
            Arc::new(source),
            SessionOptions::from_config(cfg),
            Some(self),
        )
    }

    pub(crate) fn register(&self, session: &Arc<SessionInner>) -> Registration {
        let mut g = self.inner.slots();
        let id = g.next_id;
        g.next_id = g.next_id.wrapping_add(1);
        g.entries.insert(id, Arc::downgrade(session));
        Registration {
            id,
            reg: Arc::downgrade(&self.inner),
        }
    }

    /// Number of registered sessions that are still alive.
    pub fn len(&self) -> usize {
        self.inner
            .slots()
            .entries
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_sessions(&self) -> Vec<Arc<SessionInner>> {
        let g = self.inner.slots();
        g.entries.values().filter_map(Weak::upgrade).collect()
    }

    /// Freeze every registered session's diff/copy step.
    ///
    /// Blocks while a worker is in the middle of a diff. Returns once no
    /// worker can touch its live buffer until the guard is released.
    pub fn lock_all(&self) -> BulkLock {
        // Registry mutex is not held while waiting on session locks.
        let sessions = self.live_sessions();
        for s in &sessions {
            s.snapshot.acquire();
        }
        metrics::record_bulk_lock();
        BulkLock {
            sessions,
            released: false,
        }
    }

    /// Run `f` with every registered session frozen.
    pub fn with_all_locked<R>(&self, f: impl FnOnce() -> R) -> R {
        let guard = self.lock_all();
        let out = f();
        guard.unlock();
        out
    }
}

/// Held bulk freeze. Released by `unlock()` or Drop.
///
/// Keeps the frozen sessions' shared state alive, so a session whose handle
/// is gone in the meantime is still released safely.
pub struct BulkLock {
    sessions: Vec<Arc<SessionInner>>,
    released: bool,
}

impl BulkLock {
    /// Number of sessions frozen by this guard.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn unlock(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for s in self.sessions.iter().rev() {
            s.snapshot.release();
        }
    }
}

impl Drop for BulkLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Session's ticket in a registry: `cancel()` removes the entry.
pub(crate) struct Registration {
    id: u64,
    reg: Weak<RegistryInner>,
}

impl Registration {
    pub(crate) fn cancel(self) {
        if let Some(reg) = self.reg.upgrade() {
            reg.slots().entries.remove(&self.id);
        }
    }
}

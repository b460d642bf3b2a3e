//! Buffer lock: guards a session's snapshot and can be held across calls.
//!
//! A plain `Mutex<T>` guard cannot outlive the borrow it came from, but the
//! bulk-freeze path (Registry::lock_all) has to keep N session locks held
//! until an explicit unlock. So the lock is a small gate:
//! - `held` flag + Condvar, both behind one std Mutex together with the data;
//! - `with()` runs a short critical section while the gate is open;
//! - `acquire()/release()` close and reopen the gate for an external holder.
//!
//! Not reentrant: acquiring twice on one thread deadlocks.
//! Guards release on Drop.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

struct LockState<T> {
    held: bool,
    data: T,
}

pub struct BufferLock<T> {
    state: Mutex<LockState<T>>,
    released: Condvar,
}

impl<T> BufferLock<T> {
    pub fn new(data: T) -> Self {
        Self {
            state: Mutex::new(LockState { held: false, data }),
            released: Condvar::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, LockState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_open(&self) -> MutexGuard<'_, LockState<T>> {
        let g = self.state();
        self.released
            .wait_while(g, |st| st.held)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the data. Blocks while an external
    /// holder has the lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut g = self.wait_open();
        f(&mut g.data)
    }

    /// Close the gate. Blocks until it is open. Pair with `release()`.
    pub fn acquire(&self) {
        let mut g = self.wait_open();
        g.held = true;
    }

    /// Reopen the gate and wake everyone waiting on it.
    pub fn release(&self) {
        let mut g = self.state();
        g.held = false;
        drop(g);
        self.released.notify_all();
    }

    /// Acquire and return an RAII guard.
    pub fn lock(&self) -> BufferLockGuard<'_, T> {
        self.acquire();
        BufferLockGuard { lock: self }
    }
}

pub struct BufferLockGuard<'a, T> {
    lock: &'a BufferLock<T>,
}

impl<T> Drop for BufferLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn with_blocks_while_held() {
        let lock = Arc::new(BufferLock::new(0u32));
        let entered = Arc::new(AtomicBool::new(false));

        lock.acquire();
        let t = {
            let lock = lock.clone();
            let entered = entered.clone();
            thread::spawn(move || {
                lock.with(|v| *v += 1);
                entered.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst), "critical section ran while held");

        lock.release();
        t.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
        assert_eq!(lock.with(|v| *v), 1);
    }

    #[test]
    fn guard_releases_on_drop() {
        let lock = Arc::new(BufferLock::new(0u32));
        let entered = Arc::new(AtomicBool::new(false));

        let g = lock.lock();
        let t = {
            let lock = lock.clone();
            let entered = entered.clone();
            thread::spawn(move || {
                lock.with(|v| *v = 7);
                entered.store(true, Ordering::SeqCst);
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));

        drop(g);
        t.join().unwrap();
        assert_eq!(lock.with(|v| *v), 7);

        // после drop гард можно взять снова
        drop(lock.lock());
        assert_eq!(lock.with(|v| *v), 7);
    }
}

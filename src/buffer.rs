//! Live save memory shared between the owner (emulated core) and autosave workers.
//!
//! Модель:
//! - Владелец (ядро эмулятора) пишет в буфер когда угодно, без блокировок.
//! - Воркер autosave только читает: сравнивает со своим снапшотом и копирует.
//! - Длина и адрес фиксированы на всё время жизни, буфер никогда не растёт.
//!
//! Каждый байт - AtomicU8 (Relaxed), поэтому одновременные запись и чтение
//! безопасны по памяти. Согласованность дольше одного чтения даёт только
//! `Registry::lock_all` (bulk lock).

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};

/// A fixed-length byte region an autosave session can watch.
///
/// Implementations must keep `len()` constant for their whole lifetime.
pub trait SaveSource: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the current contents into `dst`. `dst.len() == self.len()`.
    fn copy_to(&self, dst: &mut [u8]);

    /// Byte-for-byte comparison of the current contents with `other`.
    fn matches(&self, other: &[u8]) -> bool;
}

/// Reference-counted live buffer. Clones share the same memory.
#[derive(Clone)]
pub struct SharedBuffer {
    bytes: Arc<[AtomicU8]>,
}

impl SharedBuffer {
    /// Zero-filled buffer of `size` bytes.
    pub fn new(size: usize) -> Self {
        let bytes: Vec<AtomicU8> = (0..size).map(|_| AtomicU8::new(0)).collect();
        Self {
            bytes: bytes.into(),
        }
    }

    /// Buffer initialized with a copy of `data`.
    pub fn from_bytes(data: &[u8]) -> Self {
        let bytes: Vec<AtomicU8> = data.iter().map(|&b| AtomicU8::new(b)).collect();
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<u8> {
        self.bytes.get(idx).map(|b| b.load(Ordering::Relaxed))
    }

    /// Store one byte.
    ///
    /// # Panics
    /// If `idx >= len()`, like slice indexing.
    pub fn set(&self, idx: usize, value: u8) {
        self.bytes[idx].store(value, Ordering::Relaxed);
    }

    /// Write `data` starting at `offset`.
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        let end = match offset.checked_add(data.len()) {
            Some(e) if e <= self.len() => e,
            _ => bail!(
                "write out of bounds: offset={} len={} size={}",
                offset,
                data.len(),
                self.len()
            ),
        };
        for (slot, &b) in self.bytes[offset..end].iter().zip(data) {
            slot.store(b, Ordering::Relaxed);
        }
        Ok(())
    }

    pub fn fill(&self, value: u8) {
        for slot in self.bytes.iter() {
            slot.store(value, Ordering::Relaxed);
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.iter().map(|b| b.load(Ordering::Relaxed)).collect()
    }
}

impl SaveSource for SharedBuffer {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn copy_to(&self, dst: &mut [u8]) {
        debug_assert_eq!(dst.len(), self.bytes.len());
        for (d, s) in dst.iter_mut().zip(self.bytes.iter()) {
            *d = s.load(Ordering::Relaxed);
        }
    }

    fn matches(&self, other: &[u8]) -> bool {
        other.len() == self.bytes.len()
            && self
                .bytes
                .iter()
                .zip(other)
                .all(|(s, &o)| s.load(Ordering::Relaxed) == o)
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("len", &self.len())
            .finish()
    }
}

// src/ffi.rs
#![cfg(feature = "ffi")]

//! C ABI для sram-autosave (фронтенд на C держит SRAM ядра и пути сохранений).
//!
//! Модель:
//! - Opaque-хэндл SramRegistry - явный реестр (создаётся/освобождается вызывающей стороной).
//! - Opaque-хэндл SramAutosave - одна сессия; sram_autosave_free(NULL) - no-op.
//! - Ошибки возвращаются через int (0=OK, -1=ERR) и out_err (char**),
//!   строку освобождать через sram_string_free().
//!
//! Правила:
//! - `data` передаётся без копирования: память должна жить и не менять размер,
//!   пока жив хэндл SramAutosave. Ядро может писать в неё в любой момент.
//! - sram_registry_lock/unlock - строго парами; повторный lock без unlock - ошибка.
//! - Не освобождать сессию, пока реестр заблокирован (воркер может ждать lock).

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uint};
use std::path::PathBuf;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::buffer::SaveSource;
use crate::registry::{BulkLock, Registry};
use crate::session::Session;

// ---------- Caller-owned memory ----------

/// Borrowed foreign region, read byte-wise with relaxed atomics.
struct RawRegion {
    ptr: NonNull<AtomicU8>,
    len: usize,
}

// SAFETY: the C caller guarantees the region outlives the session; all access
// is through AtomicU8, which has the same layout as u8.
unsafe impl Send for RawRegion {}
unsafe impl Sync for RawRegion {}

impl RawRegion {
    fn bytes(&self) -> &[AtomicU8] {
        // SAFETY: see the Send/Sync note; len==0 uses a dangling, aligned ptr.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl SaveSource for RawRegion {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_to(&self, dst: &mut [u8]) {
        for (d, s) in dst.iter_mut().zip(self.bytes()) {
            *d = s.load(Ordering::Relaxed);
        }
    }

    fn matches(&self, other: &[u8]) -> bool {
        other.len() == self.len
            && self
                .bytes()
                .iter()
                .zip(other)
                .all(|(s, &o)| s.load(Ordering::Relaxed) == o)
    }
}

// ---------- Opaque handles ----------

pub struct SramRegistry {
    registry: Registry,
    held: Mutex<Option<BulkLock>>,
}

pub struct SramAutosave {
    session: Session,
}

// ---------- Helpers ----------

unsafe fn cstr_to_path(c: *const c_char) -> Result<PathBuf, String> {
    if c.is_null() {
        return Err("null path".into());
    }
    let s = CStr::from_ptr(c).to_str().map_err(|_| "path is not valid UTF-8")?;
    Ok(PathBuf::from(s))
}

unsafe fn set_err(out_err: *mut *mut c_char, msg: &str) {
    if out_err.is_null() {
        return;
    }
    if !(*out_err).is_null() {
        let _ = CString::from_raw(*out_err);
    }
    let c = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    *out_err = c.into_raw();
}

#[inline]
fn ret_ok() -> c_int { 0 }
#[inline]
fn ret_err() -> c_int { -1 }

// ---------- Registry ----------

#[no_mangle]
pub extern "C" fn sram_registry_new() -> *mut SramRegistry {
    Box::into_raw(Box::new(SramRegistry {
        registry: Registry::new(),
        held: Mutex::new(None),
    }))
}

#[no_mangle]
pub unsafe extern "C" fn sram_registry_free(reg: *mut SramRegistry) {
    if reg.is_null() {
        return;
    }
    // held BulkLock (если забыли unlock) отпускается в Drop
    drop(Box::from_raw(reg));
}

/// Freeze every session of the registry. Must be paired with sram_registry_unlock.
#[no_mangle]
pub unsafe extern "C" fn sram_registry_lock(
    reg: *mut SramRegistry,
    out_err: *mut *mut c_char,
) -> c_int {
    let Some(r) = reg.as_ref() else {
        set_err(out_err, "registry is null");
        return ret_err();
    };
    let mut held = r.held.lock().unwrap_or_else(PoisonError::into_inner);
    if held.is_some() {
        set_err(out_err, "registry is already locked");
        return ret_err();
    }
    *held = Some(r.registry.lock_all());
    ret_ok()
}

#[no_mangle]
pub unsafe extern "C" fn sram_registry_unlock(reg: *mut SramRegistry) {
    if let Some(r) = reg.as_ref() {
        let guard = r.held.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(g) = guard {
            g.unlock();
        }
    }
}

// ---------- Sessions ----------

/// Start autosaving `size` bytes at `data` into `path` every `interval_secs`.
/// `reg` may be NULL (session not part of any bulk lock).
#[no_mangle]
pub unsafe extern "C" fn sram_autosave_new(
    reg: *mut SramRegistry,
    path: *const c_char,
    data: *const u8,
    size: usize,
    interval_secs: c_uint,
    out: *mut *mut SramAutosave,
    out_err: *mut *mut c_char,
) -> c_int {
    if out.is_null() {
        set_err(out_err, "out is null");
        return ret_err();
    }
    *out = ptr::null_mut();

    let path = match cstr_to_path(path) {
        Ok(p) => p,
        Err(e) => {
            set_err(out_err, &e);
            return ret_err();
        }
    };

    let region_ptr = if size == 0 {
        NonNull::dangling()
    } else {
        match NonNull::new(data as *mut AtomicU8) {
            Some(p) => p,
            None => {
                set_err(out_err, "null data for non-empty buffer");
                return ret_err();
            }
        }
    };
    let region = RawRegion { ptr: region_ptr, len: size };
    let interval = Duration::from_secs(u64::from(interval_secs));

    let res = match reg.as_ref() {
        Some(r) => r.registry.spawn(path, region, interval),
        None => Session::new(path, region, interval),
    };
    match res {
        Ok(session) => {
            *out = Box::into_raw(Box::new(SramAutosave { session }));
            ret_ok()
        }
        Err(e) => {
            set_err(out_err, &format!("{:#}", e));
            ret_err()
        }
    }
}

/// Stop and free a session. NULL is a no-op.
#[no_mangle]
pub unsafe extern "C" fn sram_autosave_free(h: *mut SramAutosave) {
    if h.is_null() {
        return;
    }
    let mut b = Box::from_raw(h);
    b.session.shutdown();
}

#[no_mangle]
pub unsafe extern "C" fn sram_autosave_nudge(h: *const SramAutosave) {
    if let Some(a) = h.as_ref() {
        a.session.nudge();
    }
}

// ---------- Free helpers for foreign code ----------

#[no_mangle]
pub unsafe extern "C" fn sram_string_free(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}

// ---------- Misc ----------

#[no_mangle]
pub extern "C" fn sram_autosave_version() -> *const c_char {
    static S: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    S.as_ptr() as *const c_char
}

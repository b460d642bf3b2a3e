//! Save file I/O.
//!
//! Формат: сырые `size` байт, без заголовка, без CRC, без версии.
//! Запись - in place (create + truncate + write_all + flush [+ sync_all]),
//! без tmp+rename: падение посреди записи может испортить файл.

use anyhow::{Context, Result};
use log::warn;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::buffer::SharedBuffer;

/// Open `path` for a full rewrite (create + truncate).
pub fn open_save_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))
}

/// Write all of `bytes` into a file from `open_save_file` and flush it.
///
/// `sync` adds `sync_all`, which is also the only way a deferred close-time
/// error (e.g. ENOSPC on NFS) surfaces; plain drop of a File ignores it.
pub fn write_opened(mut f: File, path: &Path, bytes: &[u8], sync: bool) -> Result<()> {
    f.write_all(bytes)
        .with_context(|| format!("write {} B to {}", bytes.len(), path.display()))?;
    f.flush()
        .with_context(|| format!("flush {}", path.display()))?;
    if sync {
        f.sync_all()
            .with_context(|| format!("sync {}", path.display()))?;
    }
    Ok(())
}

/// Overwrite `path` with `bytes`.
pub fn write_snapshot(path: &Path, bytes: &[u8], sync: bool) -> Result<()> {
    let f = open_save_file(path)?;
    write_opened(f, path, bytes, sync)
}

/// Load an existing save file into `buf`.
///
/// Returns Ok(false) if there is no file. A shorter file fills only the head
/// of the buffer; a longer one is cut to `buf.len()`.
pub fn load_into(path: &Path, buf: &SharedBuffer) -> Result<bool> {
    let data = match fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    if data.len() != buf.len() {
        warn!(
            "save file {} is {} B, buffer is {} B",
            path.display(),
            data.len(),
            buf.len()
        );
    }
    let n = data.len().min(buf.len());
    buf.write(0, &data[..n])?;
    Ok(true)
}

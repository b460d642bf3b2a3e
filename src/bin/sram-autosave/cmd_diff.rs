use anyhow::{Context, Result};
use std::path::PathBuf;

use sram_autosave::util::diff_offsets;

pub fn exec(a: PathBuf, b: PathBuf, max: usize) -> Result<()> {
    let da = std::fs::read(&a).with_context(|| format!("read {}", a.display()))?;
    let db = std::fs::read(&b).with_context(|| format!("read {}", b.display()))?;

    if da.len() != db.len() {
        println!("size differs: {} B vs {} B", da.len(), db.len());
    }
    let offs = diff_offsets(&da, &db);
    if offs.is_empty() {
        println!("no differences in the first {} bytes", da.len().min(db.len()));
        return Ok(());
    }

    println!("{} differing bytes", offs.len());
    for &o in offs.iter().take(max) {
        println!("  {:08x}: {:02x} -> {:02x}", o, da[o], db[o]);
    }
    if offs.len() > max {
        println!("  ... {} more", offs.len() - max);
    }
    Ok(())
}

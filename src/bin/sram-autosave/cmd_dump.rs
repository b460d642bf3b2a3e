use anyhow::{Context, Result};
use std::path::PathBuf;

use sram_autosave::util::hex_dump_rows;

pub fn exec(path: PathBuf, limit: Option<usize>) -> Result<()> {
    let data = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
    let shown = limit.unwrap_or(data.len()).min(data.len());

    println!("{} ({} B)", path.display(), data.len());
    if shown > 0 {
        println!("{}", hex_dump_rows(&data[..shown]));
    }
    if shown < data.len() {
        println!("... {} more bytes", data.len() - shown);
    }
    Ok(())
}

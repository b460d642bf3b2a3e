use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sram_autosave::util::parse_u8_byte;

/// CLI для sram-autosave: симуляция и просмотр файлов сохранений
#[derive(Parser, Debug)]
#[command(name = "sram-autosave", version, about = "SRAM autosave tool")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Simulate an emulated core writing SRAM under an autosave session
    Run {
        /// Save file to keep in sync
        #[arg(long)]
        path: PathBuf,
        /// SRAM size in bytes
        #[arg(long, default_value_t = 8192)]
        size: usize,
        /// Check interval in seconds (default: SRAM_AUTOSAVE_INTERVAL or 10)
        #[arg(long)]
        interval: Option<u64>,
        /// How long to run, in seconds
        #[arg(long, default_value_t = 5.0)]
        duration: f64,
        /// Random byte writes per second (0 = never touch SRAM)
        #[arg(long, default_value_t = 20)]
        rate: u32,
        /// RNG seed for reproducible mutation patterns
        #[arg(long)]
        seed: Option<u64>,
        /// Initial fill byte (0x.., 0o.., 0b.. or decimal)
        #[arg(long, value_parser = parse_u8_byte)]
        fill: Option<u8>,
        /// Load the existing save file into SRAM before starting (after --fill)
        #[arg(long)]
        load: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare two save files byte by byte
    Diff {
        #[arg(long)]
        a: PathBuf,
        #[arg(long)]
        b: PathBuf,
        /// Print at most this many differing offsets
        #[arg(long, default_value_t = 32)]
        max: usize,
    },
    /// Hex dump of a save file
    Dump {
        #[arg(long)]
        path: PathBuf,
        /// Show at most this many bytes
        #[arg(long)]
        limit: Option<usize>,
    },
}

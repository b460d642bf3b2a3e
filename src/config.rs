//! Centralized configuration for autosave sessions.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - AutosaveConfig::from_env() reads SRAM_AUTOSAVE_* variables on top of defaults.
//! - Fluent `with_*` setters for programmatic overrides (tests, CLI).
//!
//! Defaults:
//! - interval_secs = 10 (same order as a typical frontend "SRAM autosave interval")
//! - sync_data = false (flush only; no fsync per save)
//! - thread_name = "autosave"

use std::fmt;
use std::time::Duration;

/// Default check interval in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Default worker thread name prefix.
pub const DEFAULT_THREAD_NAME: &str = "autosave";

/// Tunables for a single autosave session.
#[derive(Clone, Debug)]
pub struct AutosaveConfig {
    /// Period between diff checks, in seconds.
    /// Env: SRAM_AUTOSAVE_INTERVAL (default 10; 0 or garbage is ignored)
    pub interval_secs: u64,

    /// Call `sync_all` after every successful flush.
    /// Env: SRAM_AUTOSAVE_FSYNC (default false; "1|true|on|yes" => true)
    pub sync_data: bool,

    /// Worker thread name prefix; the file name of the save path is appended.
    /// Env: SRAM_AUTOSAVE_THREAD_NAME
    pub thread_name: String,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            sync_data: false,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl AutosaveConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("SRAM_AUTOSAVE_INTERVAL") {
            if let Ok(n) = v.trim().parse::<u64>() {
                if n > 0 {
                    cfg.interval_secs = n;
                }
            }
        }

        if let Ok(v) = std::env::var("SRAM_AUTOSAVE_FSYNC") {
            cfg.sync_data = parse_flag(&v);
        }

        if let Ok(v) = std::env::var("SRAM_AUTOSAVE_THREAD_NAME") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.thread_name = s.to_string();
            }
        }

        cfg
    }

    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    pub fn with_sync_data(mut self, on: bool) -> Self {
        self.sync_data = on;
        self
    }

    pub fn with_thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> Self {
        self
    }

    /// Interval as a Duration (what the worker actually waits on).
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn parse_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "on" || s == "yes"
}

impl fmt::Display for AutosaveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AutosaveConfig {{ interval_secs: {}, sync_data: {}, thread_name: {} }}",
            self.interval_secs, self.sync_data, self.thread_name,
        )
    }
}

use anyhow::{bail, Context, Result};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use sram_autosave::metrics::{self, MetricsSnapshot};
use sram_autosave::{load_into, AutosaveConfig, Registry, SessionStats, SharedBuffer};

pub struct RunArgs {
    pub path: PathBuf,
    pub size: usize,
    pub interval: Option<u64>,
    pub duration: f64,
    pub rate: u32,
    pub seed: Option<u64>,
    pub fill: Option<u8>,
    pub load: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct RunSummary {
    path: String,
    size: usize,
    interval_secs: u64,
    seed: u64,
    loaded: bool,
    mutations: u64,
    state_snapshots: u64,
    stats: SessionStats,
    metrics: MetricsSnapshot,
    change_ratio: f64,
    sessions_active: u64,
    file_matches_snapshot: bool,
}

/// Как часто "эмулятор" делает save state под bulk lock.
const STATE_SNAPSHOT_EVERY: Duration = Duration::from_secs(1);

pub fn exec(args: RunArgs) -> Result<()> {
    if args.size == 0 {
        bail!("--size must be > 0");
    }
    if !(args.duration.is_finite() && args.duration >= 0.0) {
        bail!("--duration must be a non-negative number of seconds");
    }

    let mut cfg = AutosaveConfig::from_env();
    if let Some(secs) = args.interval {
        cfg = cfg.with_interval_secs(secs);
    }

    let sram = SharedBuffer::new(args.size);
    if let Some(b) = args.fill {
        sram.fill(b);
    }
    let loaded = if args.load {
        load_into(&args.path, &sram)?
    } else {
        false
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);

    let registry = Registry::new();
    let mut session = registry
        .spawn_with_config(&args.path, sram.clone(), &cfg)
        .context("start autosave")?;
    info!("running for {:.1}s, {} writes/s, {}", args.duration, args.rate, cfg);

    let tick = if args.rate == 0 {
        Duration::from_millis(100)
    } else {
        Duration::from_secs(1) / args.rate
    };
    let deadline = Instant::now() + Duration::from_secs_f64(args.duration);
    let mut next_state = Instant::now() + STATE_SNAPSHOT_EVERY;
    let mut mutations = 0u64;
    let mut state_snapshots = 0u64;

    while Instant::now() < deadline {
        if args.rate > 0 {
            let idx = rng.gen_range(0..args.size);
            sram.set(idx, rng.gen());
            mutations += 1;
        }

        if Instant::now() >= next_state {
            // Save state: SRAM must not move under the autosave diff meanwhile.
            let frozen = registry.with_all_locked(|| sram.to_vec());
            state_snapshots += 1;
            log::debug!("state snapshot #{} ({} B)", state_snapshots, frozen.len());
            next_state += STATE_SNAPSHOT_EVERY;
        }

        thread::sleep(tick);
    }

    session.shutdown();

    let m = metrics::snapshot();
    let on_disk = std::fs::read(&args.path).ok();
    let snapshot = session.snapshot();
    let summary = RunSummary {
        path: args.path.display().to_string(),
        size: args.size,
        interval_secs: cfg.interval_secs,
        seed,
        loaded,
        mutations,
        state_snapshots,
        stats: session.stats(),
        change_ratio: m.change_ratio(),
        sessions_active: m.sessions_active(),
        metrics: m,
        file_matches_snapshot: on_disk.as_deref() == Some(snapshot.as_slice()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("path:             {}", summary.path);
        println!("size:             {} B", summary.size);
        println!("interval:         {} s", summary.interval_secs);
        println!("seed:             {}", summary.seed);
        println!("loaded:           {}", summary.loaded);
        println!("mutations:        {}", summary.mutations);
        println!("state snapshots:  {}", summary.state_snapshots);
        println!("wake cycles:      {}", summary.stats.wake_cycles);
        println!("writes ok/failed: {}/{}", summary.stats.writes_ok, summary.stats.writes_failed);
        println!("change ratio:     {:.3}", summary.change_ratio);
        println!("active sessions:  {}", summary.sessions_active);
        println!("file == snapshot: {}", summary.file_matches_snapshot);
    }
    Ok(())
}

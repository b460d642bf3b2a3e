use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use oorandom::Rand32;
use sram_autosave::{load_into, AutosaveConfig, Registry, Session, SharedBuffer};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir();
    base.join(format!("srmtest-load-{prefix}-{pid}-{t}-{id}"))
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[test]
fn load_missing_file_leaves_buffer() -> Result<()> {
    let root = unique_root("missing");
    fs::create_dir_all(&root)?;

    let sram = SharedBuffer::from_bytes(&[3; 8]);
    assert!(!load_into(&root.join("none.srm"), &sram)?);
    assert_eq!(sram.to_vec(), vec![3; 8]);
    Ok(())
}

#[test]
fn load_short_and_long_files() -> Result<()> {
    let root = unique_root("sizes");
    fs::create_dir_all(&root)?;

    let short = root.join("short.srm");
    fs::write(&short, [1u8, 2, 3])?;
    let sram = SharedBuffer::new(6);
    assert!(load_into(&short, &sram)?);
    assert_eq!(sram.to_vec(), vec![1, 2, 3, 0, 0, 0]);

    let long = root.join("long.srm");
    fs::write(&long, [9u8; 10])?;
    let sram = SharedBuffer::new(4);
    assert!(load_into(&long, &sram)?);
    assert_eq!(sram.to_vec(), vec![9; 4]);
    Ok(())
}

#[test]
fn reload_after_session_roundtrips_contents() -> Result<()> {
    let root = unique_root("reload");
    fs::create_dir_all(&root)?;
    let path = root.join("game.srm");

    let cfg = AutosaveConfig::default()
        .with_interval_secs(1)
        .with_sync_data(true)
        .with_thread_name("test-autosave");

    let sram = SharedBuffer::new(256);
    let mut rng = Rand32::new(0x5eed);
    {
        let reg = Registry::new();
        let s = reg.spawn_with_config(&path, sram.clone(), &cfg)?;
        assert_eq!(s.interval(), Duration::from_secs(1));

        for _ in 0..64 {
            let idx = rng.rand_range(0..256) as usize;
            sram.set(idx, rng.rand_u32() as u8);
        }
        s.nudge();
        assert!(wait_until(Duration::from_secs(3), || s.stats().writes_ok >= 1));
        // последний снапшот == живой буфер (больше никто не пишет)
        assert!(wait_until(Duration::from_secs(3), || {
            s.snapshot() == sram.to_vec()
        }));
    }

    let restored = SharedBuffer::new(256);
    assert!(load_into(&path, &restored)?);
    assert_eq!(restored.to_vec(), sram.to_vec());

    // Новая сессия поверх загруженного буфера ничего не пишет.
    let before = fs::metadata(&path)?.modified()?;
    let s = Session::new(&path, restored.clone(), Duration::from_millis(20))?;
    assert!(wait_until(Duration::from_secs(2), || s.stats().wake_cycles >= 3));
    assert_eq!(s.stats().writes_attempted(), 0);
    assert_eq!(fs::metadata(&path)?.modified()?, before);
    Ok(())
}

#[test]
fn config_from_env_ignores_garbage() {
    // Только чтение: не трогаем env, параллельные тесты не мешают.
    let cfg = AutosaveConfig::from_env();
    assert!(cfg.interval_secs > 0);
    assert!(!cfg.thread_name.is_empty());
}

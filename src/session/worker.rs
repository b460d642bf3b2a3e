//! Worker thread body.
//!
//! Цикл (RUNNING -> WAITING -> RUNNING, выход в STOPPED):
//! 1. Быстрый (несинхронизированный) взгляд на quit_hint - только подсказка.
//! 2. Под buffer lock: сравнить снапшот с живым буфером; если отличается -
//!    скопировать живой буфер в scratch и в снапшот. Снапшот продвигается
//!    даже если запись потом не удастся: та же версия повторно не пишется.
//! 3. Вне lock: записать scratch на диск. Ошибка - warn!, цикл продолжается.
//!    Длинное "Autosaving SRAM to ..." пишется только после удачного open.
//! 4. Под wait lock: если quit ещё не выставлен - ждать `interval` или сигнала.
//!    Решение о выходе принимается только здесь, под wait lock.

use log::{debug, info, warn};
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};

use super::persist::{open_save_file, write_opened};
use super::SessionInner;
use crate::metrics;

pub(crate) fn run(inner: Arc<SessionInner>, mut scratch: Vec<u8>) {
    let mut first_log = true;

    loop {
        // Advisory: may miss a quit that is being set right now; the check
        // under the wait lock below is the one that counts.
        if inner.quit_hint.load(Ordering::Relaxed) {
            break;
        }

        let changed = inner.snapshot.with(|snap| {
            if inner.source.matches(snap) {
                return false;
            }
            inner.source.copy_to(&mut scratch);
            snap.copy_from_slice(&scratch);
            true
        });
        inner.stats.record_cycle(changed);
        metrics::record_wake_cycle(changed);

        if changed {
            save(&inner, &scratch, &mut first_log);
        }

        if wait_for_next_cycle(&inner) {
            break;
        }
    }

    debug!("autosave worker for {} exiting", inner.path.display());
}

fn save(inner: &SessionInner, bytes: &[u8], first_log: &mut bool) {
    let res = open_save_file(&inner.path).and_then(|f| {
        // Не спамим лог: полное сообщение один раз (после первого open), дальше короткое.
        if *first_log {
            info!(
                "Autosaving SRAM to \"{}\", will continue to check every {} seconds ...",
                inner.path.display(),
                interval_secs_display(inner)
            );
            *first_log = false;
        } else {
            info!("SRAM changed ... autosaving ...");
        }
        write_opened(f, &inner.path, bytes, inner.sync_data)
    });

    match res {
        Ok(()) => {
            inner.stats.record_write_ok(bytes.len());
            metrics::record_write_ok(bytes.len());
        }
        Err(e) => {
            inner.stats.record_write_failed();
            metrics::record_write_failed();
            warn!("Failed to autosave SRAM. Disk might be full. ({:#})", e);
        }
    }
}

/// Sleep until the interval elapses, a nudge arrives or quit is requested.
/// Returns true if the worker must stop.
fn wait_for_next_cycle(inner: &SessionInner) -> bool {
    let mut st = inner.wait_state();
    if !st.quit && !st.nudged {
        let (g, _timeout) = inner
            .wake
            .wait_timeout_while(st, inner.interval, |s| !s.quit && !s.nudged)
            .unwrap_or_else(PoisonError::into_inner);
        st = g;
    }
    st.nudged = false;
    st.quit
}

fn interval_secs_display(inner: &SessionInner) -> String {
    let d = inner.interval;
    if d.subsec_nanos() == 0 {
        d.as_secs().to_string()
    } else {
        format!("{:.3}", d.as_secs_f64())
    }
}

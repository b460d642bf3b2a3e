//! sram-autosave - periodic background persistence of live save memory.
//!
//! A `Session` watches a fixed-size live buffer (emulated SRAM) and, on a
//! dedicated thread, rewrites its save file whenever the contents changed
//! since the last check. A `Registry` lets outside code freeze every
//! session at once (save states, SRAM export).

// Базовые модули
pub mod config;
pub mod error;
pub mod metrics;

// Живой буфер и примитивы синхронизации
pub mod buffer;
pub mod lock;

// Сессии и реестр
pub mod registry;
pub mod session; // src/session/{mod,handle,worker,persist}.rs

// Утилиты (hex dump, разбор байтов для CLI)
pub mod util;

// C ABI - включается фичей "ffi"
#[cfg(feature = "ffi")]
pub mod ffi;

// Удобные реэкспорты
pub use buffer::{SaveSource, SharedBuffer};
pub use config::AutosaveConfig;
pub use error::AutosaveError;
pub use registry::{BulkLock, Registry};
pub use session::persist::{load_into, write_snapshot};
pub use session::{destroy, Session, SessionStats};

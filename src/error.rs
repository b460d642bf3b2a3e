//! Typed construction errors.
//!
//! Всё остальное идёт через anyhow; эти варианты нужны вызывающей стороне,
//! чтобы отличить причину отказа Session::new через `downcast_ref`.
//! Ошибки записи (PersistenceWriteFailure) сюда не попадают: они остаются
//! внутри воркера и только логируются.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AutosaveError {
    /// Snapshot buffer of `size` bytes could not be allocated.
    #[error("failed to allocate snapshot buffer ({size} B)")]
    AllocationFailure { size: usize },

    /// Interval of zero would turn the worker into a busy loop.
    #[error("autosave interval must be non-zero")]
    InvalidInterval,

    /// The OS refused to start the worker thread.
    #[error("failed to spawn autosave thread: {0}")]
    ThreadSpawnFailure(String),
}

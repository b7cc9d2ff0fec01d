//! Shared error taxonomy for the engine's fatal boundaries.
//!
//! Routine, recoverable failures (a single RPC call failing to connect, a
//! worker's own task blowing up) are propagated with `anyhow` as elsewhere
//! in this crate; `EngineError` exists for the handful of conditions that
//! are protocol violations or invariant breaches, where the caller wants
//! to match on *what kind* of fatal condition occurred.

use crate::mr::rpc::TaskKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode intermediate data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("task update for unknown task: {kind:?} #{number}")]
    UnknownTask { kind: TaskKind, number: usize },

    #[error("invariant breach: {0}")]
    InvariantBreach(String),

    #[error("no plugin registered under the name {0:?}")]
    PluginNotFound(String),

    #[error("malformed intermediate file name {0:?}")]
    MalformedIntermediateName(String),
}

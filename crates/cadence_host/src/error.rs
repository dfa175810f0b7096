use cadence_core::{Phase, WorldError};
use thiserror::Error;

/// Errors surfaced by the scheduler, providers, and module host.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("module '{module}' has an invalid execution policy: {reason}")]
    PolicyInvalid { module: String, reason: &'static str },

    #[error("system ordering cycle in phase {phase:?} among: {}", members.join(", "))]
    CycleDetected { phase: Phase, members: Vec<String> },

    #[error("system '{name}' is already registered")]
    DuplicateSystem { name: String },

    #[error("module '{name}' is already registered")]
    DuplicateModule { name: String },

    #[error("host is already built; registration and re-initialization are rejected")]
    AlreadyBuilt,

    #[error("host must be built before running frames")]
    NotBuilt,

    #[error("a frame-level fault left the host paused")]
    Faulted,

    #[error("snapshot pool is exhausted")]
    PoolExhausted,

    #[error("snapshot lease expired; the view is stale")]
    StaleView,

    #[error("module '{module}' exceeded its expected runtime")]
    Timeout { module: String },

    #[error("module '{module}' is suppressed by an open circuit breaker")]
    CircuitOpen { module: String },

    #[error(transparent)]
    World(#[from] WorldError),
}

use crate::phase::Phase;
use thiserror::Error;

/// Errors surfaced by repository and registry operations.
///
/// These indicate developer or configuration mistakes and fail the owning
/// operation; they are never swallowed by the core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("entity handle is stale or destroyed")]
    NotAlive,

    #[error("component type '{name}' is not registered with this repository")]
    NotRegistered { name: &'static str },

    #[error("entity does not carry component '{name}'")]
    Missing { name: &'static str },

    #[error("operation '{operation}' is not permitted during phase {phase:?}")]
    WrongPhase {
        phase: Phase,
        operation: &'static str,
    },

    #[error("capacity exceeded: {what}")]
    CapacityExceeded { what: &'static str },

    #[error("structural mutation attempted on a read-only view")]
    StructuralDuringRead,

    #[error(
        "managed component '{name}' has no snapshot mode; either make it immutable and register \
         with SnapshotMode::Shared, opt out with SnapshotMode::Transient, or pass an explicit \
         mode to register_managed_with"
    )]
    SnapshotModeRequired { name: &'static str },
}

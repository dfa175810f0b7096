use crate::bus::NodeId;
use thiserror::Error;

/// Errors surfaced by time controllers and the mode coordinator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimeError {
    #[error("operation '{operation}' is not valid for the active time mode")]
    WrongMode { operation: &'static str },

    #[error("lockstep peer {node} has not acknowledged within the deadline")]
    PeerUnreachable { node: NodeId },

    #[error("switch barrier at frame {barrier_frame} already passed (local frame {local_frame})")]
    BarrierExpired {
        barrier_frame: i64,
        local_frame: i64,
    },

    #[error("truncated or malformed {message} message")]
    Truncated { message: &'static str },
}

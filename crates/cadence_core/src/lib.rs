//! Cadence Core
//!
//! The data layer of the simulation runtime:
//! - Component type registry and entity index
//! - Chunked, write-versioned component storage (unmanaged + managed)
//! - Double-buffered event transport
//! - Deferred structural command buffers
//! - The entity repository with queries, phases, and dirty-chunk sync

mod command;
mod entity;
mod error;
mod event;
mod mask;
mod phase;
mod query;
mod registry;
mod storage;
mod world;

pub use command::{CommandBuffer, EntityRef, PlaybackStats};
pub use entity::{Entity, Lifecycle};
pub use error::WorldError;
pub use event::{
    CapturedStream, Event, EventBus, EventFrame, EventSpan, EventTypeId, RawEventView,
    MAX_EVENT_TYPES,
};
pub use mask::ComponentMask;
pub use phase::Phase;
pub use query::{QueryBuilder, QueryIter};
pub use registry::{
    Component, ComponentInfo, ComponentKind, ComponentRegistry, ComponentTypeId, ManagedComponent,
    SnapshotMode, MAX_COMPONENT_TYPES,
};
pub use storage::ManagedRef;
pub use world::{SchemaSetup, SyncOptions, SyncReport, World};

/// Runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}

// mod.rs - Component storage exports
//
// Chunked tables are the unit of change tracking: every mutating access
// stamps the owning chunk with the repository's current version, and replica
// sync copies only chunks stamped after the mirror's last refresh.

mod chunk;
mod managed;
mod singleton;
mod table;

pub(crate) use managed::ManagedTable;
pub(crate) use singleton::{SingletonSlot, SingletonValue};
pub(crate) use table::ComponentTable;

use std::any::Any;
use std::sync::Arc;

/// Shared reference stored in managed component slots.
pub type ManagedRef = Arc<dyn Any + Send + Sync>;

/// Sentinel for "entity has no row in this table".
pub(crate) const INVALID_SLOT: u32 = u32::MAX;

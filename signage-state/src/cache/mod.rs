//! Last-known-good state per display

mod snapshot;
mod store;

pub use snapshot::CachedSnapshot;
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};

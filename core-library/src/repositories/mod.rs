//! Repository pattern implementations for data access
//!
//! The traits are the narrow interfaces the linker and the syncer depend on;
//! the `Sqlite*` types implement them over a shared `SqlitePool`.

pub mod entity;
pub mod last_sync;
pub mod link;
pub mod synced;

pub use entity::{EntityRepository, SqliteEntityRepository};
pub use last_sync::{LastSyncRepository, SqliteLastSyncRepository};
pub use link::{LinkRepository, Linkables, SqliteLinkRepository};
pub use synced::{SqliteSyncRepository, SyncRepository};

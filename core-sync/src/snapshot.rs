//! Snapshot hook
//!
//! Snapshots themselves (what is captured, where it is stored, how it is
//! restored) belong to the host. The coordinator only asks for an automatic
//! one before a sync mutates anything.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Snapshotter: Send + Sync {
    /// Take an automatic snapshot, keeping at most `keep` automatic snapshots.
    async fn auto_snapshot(&self, keep: u32) -> Result<()>;
}

//! Sync statistics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::ops::AddAssign;

/// What one pass changed, across accounts and attribute classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    /// Parameters recorded from a first observation.
    pub imported: u64,
    /// Persisted values replaced by a remote value.
    pub pulled: u64,
    pub liked: u64,
    pub unliked: u64,
    pub playlists_created: u64,
    pub playlists_deleted: u64,
    pub renamed: u64,
    pub visibility_changed: u64,
    /// Works that could not be resolved on the account's service.
    pub still_missing: u64,
    pub broken_links: u64,
}

impl PassStats {
    /// Mutations that can change what the next pass observes.
    pub fn changes(&self) -> u64 {
        self.imported
            + self.pulled
            + self.liked
            + self.unliked
            + self.playlists_created
            + self.playlists_deleted
            + self.renamed
            + self.visibility_changed
    }
}

impl AddAssign for PassStats {
    fn add_assign(&mut self, other: Self) {
        self.imported += other.imported;
        self.pulled += other.pulled;
        self.liked += other.liked;
        self.unliked += other.unliked;
        self.playlists_created += other.playlists_created;
        self.playlists_deleted += other.playlists_deleted;
        self.renamed += other.renamed;
        self.visibility_changed += other.visibility_changed;
        self.still_missing += other.still_missing;
        self.broken_links += other.broken_links;
    }
}

/// Rows reclaimed after a successful sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Housekeeping {
    pub params_deleted: u64,
    pub entities_deleted: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub sync_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub snapshot_taken: bool,
    pub passes: Vec<PassStats>,
    pub housekeeping: Housekeeping,
}

impl SyncReport {
    pub fn totals(&self) -> PassStats {
        let mut totals = PassStats::default();
        for pass in &self.passes {
            totals += *pass;
        }
        totals
    }

    /// The last pass found nothing left to do.
    pub fn converged(&self) -> bool {
        self.passes.last().is_some_and(|pass| pass.changes() == 0)
    }

    /// Works still unresolved after the last pass.
    pub fn still_missing(&self) -> u64 {
        self.passes.last().map_or(0, |pass| pass.still_missing)
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let totals = self.totals();
        write!(
            f,
            "sync {}: {} pass(es), +{} liked, -{} unliked, {} pulled, {} still missing",
            self.sync_id,
            self.passes.len(),
            totals.liked,
            totals.unliked,
            totals.pulled,
            self.still_missing()
        )
    }
}

//! # Sync Module
//!
//! Reconciles a liked library across streaming service accounts.
//!
//! ## Overview
//!
//! Every account's liked albums, artists and tracks, and the playlists it
//! owns, are observed, linked to canonical entities and compared with the
//! persisted state. Disagreements are settled by time: a value changed after
//! the account was last observed is pushed to it, anything older is pulled
//! from it.
//!
//! ## Components
//!
//! - **Syncer** (`syncer`): generic two-sided reconciliation of one parameter
//! - **Liked-set orchestrator** (`likeable`): like/unlike per attribute class
//! - **Playlist orchestrator** (`meta`): existence, name and visibility
//! - **Recovery log** (`recovery`): compensating actions of a failed pass
//! - **Sync Coordinator** (`coordinator`): lease, passes, snapshots, events

pub mod account;
pub mod coordinator;
pub mod error;
pub mod likeable;
pub mod meta;
pub mod recovery;
pub mod report;
pub mod snapshot;
pub mod syncer;

pub use account::{Account, AttributeClass, Likeable};
pub use coordinator::{liked_param, SyncCoordinator, SyncCoordinatorBuilder};
pub use error::{Result, SyncError};
pub use likeable::LikeableSync;
pub use meta::{OwnedPlaylists, PlaylistSync};
pub use recovery::RecoveryLog;
pub use report::{Housekeeping, PassStats, SyncReport};
pub use snapshot::Snapshotter;
pub use syncer::{Inbound, Outbound, Reconciliation, Syncer};

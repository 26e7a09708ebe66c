//! # Library Module
//!
//! Owns the canonical record store every streaming service is reconciled
//! against.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite schema and migrations
//! - Canonical entities and their per-service links
//! - Timestamped synced parameters (liked state, playlist metadata)
//! - Per-account last-sync watermarks
//!
//! Timestamps are milliseconds since the Unix epoch taken from an injected
//! [`Clock`](bridge_traits::Clock).

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{AccountLastSync, Entity, EntityId, Linked, SyncValue, Synced};
pub use repositories::{
    EntityRepository, LastSyncRepository, LinkRepository, Linkables, SqliteEntityRepository,
    SqliteLastSyncRepository, SqliteLinkRepository, SqliteSyncRepository, SyncRepository,
};

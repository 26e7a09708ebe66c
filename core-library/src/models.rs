//! Domain models for the canonical library
//!
//! Entities are service-independent identities, links map an entity to its id
//! on one service, and synced parameters are the timestamped scalars the
//! syncer reconciles.

use bridge_traits::WorkKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use crate::error::{LibraryError, Result};

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a canonical entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) fn parse_entity_id(raw: &str) -> Result<EntityId> {
    EntityId::from_string(raw).map_err(|e| LibraryError::InvalidInput {
        field: "entity_id".to_string(),
        message: e.to_string(),
    })
}

// =============================================================================
// Entity
// =============================================================================

/// One logical work, independent of any service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: EntityId,
    pub kind: WorkKind,
    pub created_at: i64,
}

#[derive(Debug, FromRow)]
pub(crate) struct EntityRow {
    pub id: String,
    pub kind: String,
    pub created_at: i64,
}

impl TryFrom<EntityRow> for Entity {
    type Error = LibraryError;

    fn try_from(row: EntityRow) -> Result<Self> {
        Ok(Self {
            id: parse_entity_id(&row.id)?,
            kind: row.kind.parse()?,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Linked
// =============================================================================

/// Mapping of an entity to its identifier on one service.
///
/// `remote_id == None` means the entity is known not to exist on the
/// service right now, which is different from having no record at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Linked {
    pub entity_id: EntityId,
    pub service: String,
    pub remote_id: Option<String>,
    /// Milliseconds since the Unix epoch
    pub modified_at: i64,
}

impl Linked {
    pub fn is_missing(&self) -> bool {
        self.remote_id.is_none()
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct LinkedRow {
    pub entity_id: String,
    pub service: String,
    pub remote_id: Option<String>,
    pub modified_at: i64,
}

impl TryFrom<LinkedRow> for Linked {
    type Error = LibraryError;

    fn try_from(row: LinkedRow) -> Result<Self> {
        Ok(Self {
            entity_id: parse_entity_id(&row.entity_id)?,
            service: row.service,
            remote_id: row.remote_id,
            modified_at: row.modified_at,
        })
    }
}

// =============================================================================
// Synced parameters
// =============================================================================

/// Value type a synced parameter can hold.
///
/// Every type has an "unsynced" value (not liked, empty name) that new
/// parameters start from and that housekeeping reclaims.
pub trait SyncValue:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn unsynced() -> Self;

    fn is_unsynced(&self) -> bool {
        *self == Self::unsynced()
    }
}

impl SyncValue for bool {
    fn unsynced() -> Self {
        false
    }
}

impl SyncValue for String {
    fn unsynced() -> Self {
        String::new()
    }
}

/// A persisted scalar together with the time it last changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Synced<T> {
    pub entity_id: EntityId,
    value: T,
    modified_at: i64,
}

impl<T: SyncValue> Synced<T> {
    pub fn new(entity_id: EntityId, value: T, modified_at: i64) -> Self {
        Self {
            entity_id,
            value,
            modified_at,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn modified_at(&self) -> i64 {
        self.modified_at
    }

    /// Replace the value, stamping `now`.
    ///
    /// Setting the current value is a no-op and keeps the timestamp. Otherwise
    /// the timestamp strictly increases even if `now` did not move.
    ///
    /// # Returns
    ///
    /// `true` when the value changed and must be saved.
    pub fn set(&mut self, value: T, now: i64) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        self.modified_at = now.max(self.modified_at.saturating_add(1));
        true
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct SyncedRow {
    pub entity_id: String,
    pub value: String,
    pub modified_at: i64,
}

impl<T: SyncValue> TryFrom<SyncedRow> for Synced<T> {
    type Error = LibraryError;

    fn try_from(row: SyncedRow) -> Result<Self> {
        Ok(Self {
            entity_id: parse_entity_id(&row.entity_id)?,
            value: serde_json::from_str(&row.value)?,
            modified_at: row.modified_at,
        })
    }
}

// =============================================================================
// Account last sync
// =============================================================================

/// How far an account's remote side has been observed for one attribute class.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AccountLastSync {
    pub account: String,
    pub class: String,
    pub synced_at: i64,
}

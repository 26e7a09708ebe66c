//! Entity repository trait and implementation

use crate::error::Result;
use crate::models::{Entity, EntityId, EntityRow};
use async_trait::async_trait;
use bridge_traits::{Clock, WorkKind};
use sqlx::{query, query_as, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info};

/// Canonical entity space
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Create a fresh entity of `kind` and return its id.
    async fn create_entity(&self, kind: WorkKind) -> Result<EntityId>;

    /// Find an entity by id
    ///
    /// # Returns
    /// - `Ok(Some(entity))` if found
    /// - `Ok(None)` if not found
    async fn find(&self, id: &EntityId) -> Result<Option<Entity>>;

    /// Delete entities of `kind` that have no concrete link on any service.
    ///
    /// Links marked missing do not keep an entity alive. Returns the number
    /// of deleted entities.
    async fn delete_not_linked(&self, kind: WorkKind) -> Result<u64>;

    /// Delete every entity of `kind` together with its links and parameters.
    async fn delete_all(&self, kind: WorkKind) -> Result<u64>;

    async fn count(&self, kind: WorkKind) -> Result<i64>;
}

/// SQLite implementation of EntityRepository
pub struct SqliteEntityRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteEntityRepository {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl EntityRepository for SqliteEntityRepository {
    async fn create_entity(&self, kind: WorkKind) -> Result<EntityId> {
        let id = EntityId::new();

        query("INSERT INTO entities (id, kind, created_at) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(kind.as_str())
            .bind(self.clock.unix_timestamp_millis())
            .execute(&self.pool)
            .await?;

        debug!(entity_id = %id, kind = %kind, "Created entity");
        Ok(id)
    }

    async fn find(&self, id: &EntityId) -> Result<Option<Entity>> {
        let row = query_as::<_, EntityRow>("SELECT id, kind, created_at FROM entities WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Entity::try_from).transpose()
    }

    async fn delete_not_linked(&self, kind: WorkKind) -> Result<u64> {
        let result = query(
            r#"
            DELETE FROM entities
            WHERE kind = ?
              AND NOT EXISTS (
                  SELECT 1 FROM links
                  WHERE links.entity_id = entities.id
                    AND links.remote_id IS NOT NULL
              )
            "#,
        )
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!(kind = %kind, deleted, "Deleted entities without links");
        }
        Ok(deleted)
    }

    async fn delete_all(&self, kind: WorkKind) -> Result<u64> {
        let result = query("DELETE FROM entities WHERE kind = ?")
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;

        info!(kind = %kind, deleted = result.rows_affected(), "Deleted all entities");
        Ok(result.rows_affected())
    }

    async fn count(&self, kind: WorkKind) -> Result<i64> {
        let (count,): (i64,) = query_as("SELECT COUNT(*) FROM entities WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

//! Link repository trait and implementation
//!
//! A link maps an entity to its identifier on one service. The table keeps
//! at most one link per (entity, service) and at most one entity per concrete
//! (service, remote id): claiming a remote id for a new entity marks the
//! previous owner missing in the same transaction.

use crate::error::{LibraryError, Result};
use crate::models::{EntityId, Linked, LinkedRow};
use async_trait::async_trait;
use bridge_traits::Clock;
use sqlx::{query, query_as, SqlitePool};
use std::sync::Arc;
use tracing::{debug, warn};

/// Link repository interface
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Create or replace the link of `entity_id` on `service`.
    ///
    /// `remote_id == None` records the entity as missing on the service.
    async fn create_link(
        &self,
        entity_id: &EntityId,
        service: &str,
        remote_id: Option<&str>,
    ) -> Result<Linked>;

    async fn find_by_entity(&self, entity_id: &EntityId, service: &str) -> Result<Option<Linked>>;

    async fn find_by_remote_id(&self, service: &str, remote_id: &str) -> Result<Option<Linked>>;

    /// Overwrite the remote id of an existing link, stamping the current time.
    ///
    /// # Errors
    /// Returns [`LibraryError::NotFound`] if the entity has no link on the service.
    async fn set_remote_id(
        &self,
        entity_id: &EntityId,
        service: &str,
        remote_id: Option<&str>,
    ) -> Result<Linked>;

    /// Every link of an entity, across services.
    async fn links_for_entity(&self, entity_id: &EntityId) -> Result<Vec<Linked>>;
}

/// SQLite implementation of LinkRepository
pub struct SqliteLinkRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteLinkRepository {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    async fn upsert(
        &self,
        entity_id: &EntityId,
        service: &str,
        remote_id: Option<&str>,
    ) -> Result<Linked> {
        let now = self.clock.unix_timestamp_millis();
        let entity = entity_id.to_string();
        let mut tx = self.pool.begin().await?;

        if let Some(remote_id) = remote_id {
            let released = query(
                r#"
                UPDATE links SET remote_id = NULL, modified_at = ?
                WHERE service = ? AND remote_id = ? AND entity_id != ?
                "#,
            )
            .bind(now)
            .bind(service)
            .bind(remote_id)
            .bind(&entity)
            .execute(&mut *tx)
            .await?;

            if released.rows_affected() > 0 {
                warn!(
                    service,
                    remote_id,
                    entity_id = %entity_id,
                    "Remote id moved to another entity; previous owner marked missing"
                );
            }
        }

        query(
            r#"
            INSERT INTO links (entity_id, service, remote_id, modified_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(entity_id, service) DO UPDATE SET
                remote_id = excluded.remote_id,
                modified_at = excluded.modified_at
            "#,
        )
        .bind(&entity)
        .bind(service)
        .bind(remote_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(entity_id = %entity_id, service, remote_id = ?remote_id, "Stored link");
        Ok(Linked {
            entity_id: *entity_id,
            service: service.to_string(),
            remote_id: remote_id.map(str::to_string),
            modified_at: now,
        })
    }
}

#[async_trait]
impl LinkRepository for SqliteLinkRepository {
    async fn create_link(
        &self,
        entity_id: &EntityId,
        service: &str,
        remote_id: Option<&str>,
    ) -> Result<Linked> {
        self.upsert(entity_id, service, remote_id).await
    }

    async fn find_by_entity(&self, entity_id: &EntityId, service: &str) -> Result<Option<Linked>> {
        let row = query_as::<_, LinkedRow>(
            "SELECT entity_id, service, remote_id, modified_at FROM links WHERE entity_id = ? AND service = ?",
        )
        .bind(entity_id.to_string())
        .bind(service)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Linked::try_from).transpose()
    }

    async fn find_by_remote_id(&self, service: &str, remote_id: &str) -> Result<Option<Linked>> {
        let row = query_as::<_, LinkedRow>(
            "SELECT entity_id, service, remote_id, modified_at FROM links WHERE service = ? AND remote_id = ?",
        )
        .bind(service)
        .bind(remote_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Linked::try_from).transpose()
    }

    async fn set_remote_id(
        &self,
        entity_id: &EntityId,
        service: &str,
        remote_id: Option<&str>,
    ) -> Result<Linked> {
        if self.find_by_entity(entity_id, service).await?.is_none() {
            return Err(LibraryError::NotFound {
                entity_type: "link".to_string(),
                id: format!("{}@{}", entity_id, service),
            });
        }
        self.upsert(entity_id, service, remote_id).await
    }

    async fn links_for_entity(&self, entity_id: &EntityId) -> Result<Vec<Linked>> {
        let rows = query_as::<_, LinkedRow>(
            "SELECT entity_id, service, remote_id, modified_at FROM links WHERE entity_id = ? ORDER BY service",
        )
        .bind(entity_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Linked::try_from).collect()
    }
}

/// Links of a single service.
#[derive(Clone)]
pub struct Linkables {
    repo: Arc<dyn LinkRepository>,
    service: String,
}

impl Linkables {
    pub fn new(repo: Arc<dyn LinkRepository>, service: impl Into<String>) -> Self {
        Self {
            repo,
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub async fn create_link(&self, entity_id: &EntityId, remote_id: Option<&str>) -> Result<Linked> {
        self.repo.create_link(entity_id, &self.service, remote_id).await
    }

    pub async fn linked_by_entity(&self, entity_id: &EntityId) -> Result<Option<Linked>> {
        self.repo.find_by_entity(entity_id, &self.service).await
    }

    pub async fn linked_by_remote_id(&self, remote_id: &str) -> Result<Option<Linked>> {
        self.repo.find_by_remote_id(&self.service, remote_id).await
    }

    pub async fn set_remote_id(&self, entity_id: &EntityId, remote_id: Option<&str>) -> Result<Linked> {
        self.repo.set_remote_id(entity_id, &self.service, remote_id).await
    }
}

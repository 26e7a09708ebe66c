//! Synced parameter repository
//!
//! Each repository instance is scoped to one named parameter ("liked",
//! "playlist.name", ...) and one value type. Values are stored JSON-encoded
//! in the shared `synced_params` table.

use crate::error::Result;
use crate::models::{EntityId, SyncValue, Synced, SyncedRow};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};
use std::collections::HashMap;
use std::marker::PhantomData;
use tracing::{debug, info};

/// Persisted side of the syncer for one parameter.
#[async_trait]
pub trait SyncRepository<T: SyncValue>: Send + Sync {
    /// Name of the parameter this repository stores.
    fn param(&self) -> &str;

    /// Create the parameter for `entity_id` holding the unsynced value.
    ///
    /// The new record has `modified_at == 0`, so the first real value written
    /// through [`Synced::set`] always carries a fresh timestamp. Creating an
    /// existing parameter returns it unchanged.
    async fn create_synced(&self, entity_id: &EntityId) -> Result<Synced<T>>;

    async fn synced(&self, entity_id: &EntityId) -> Result<Option<Synced<T>>>;

    /// Persist value and timestamp of a parameter.
    async fn save(&self, synced: &Synced<T>) -> Result<()>;

    /// Parameters modified strictly after `since`.
    async fn synced_newer_than(&self, since: i64) -> Result<HashMap<EntityId, Synced<T>>>;

    /// Parameters modified at or before `since`.
    async fn synced_older_than(&self, since: i64) -> Result<HashMap<EntityId, Synced<T>>>;

    /// Delete parameters holding the unsynced value.
    async fn delete_unsynced(&self) -> Result<u64>;
}

/// SQLite implementation of SyncRepository
pub struct SqliteSyncRepository<T> {
    pool: SqlitePool,
    param: String,
    _value: PhantomData<fn() -> T>,
}

impl<T: SyncValue> SqliteSyncRepository<T> {
    pub fn new(pool: SqlitePool, param: impl Into<String>) -> Self {
        Self {
            pool,
            param: param.into(),
            _value: PhantomData,
        }
    }

    fn collect(rows: Vec<SyncedRow>) -> Result<HashMap<EntityId, Synced<T>>> {
        rows.into_iter()
            .map(|row| {
                let synced = Synced::<T>::try_from(row)?;
                Ok((synced.entity_id, synced))
            })
            .collect()
    }
}

#[async_trait]
impl<T: SyncValue> SyncRepository<T> for SqliteSyncRepository<T> {
    fn param(&self) -> &str {
        &self.param
    }

    async fn create_synced(&self, entity_id: &EntityId) -> Result<Synced<T>> {
        let value = serde_json::to_string(&T::unsynced())?;

        query(
            r#"
            INSERT INTO synced_params (param, entity_id, value, modified_at)
            VALUES (?, ?, ?, 0)
            ON CONFLICT(param, entity_id) DO NOTHING
            "#,
        )
        .bind(&self.param)
        .bind(entity_id.to_string())
        .bind(value)
        .execute(&self.pool)
        .await?;

        match self.synced(entity_id).await? {
            Some(synced) => Ok(synced),
            None => Ok(Synced::new(*entity_id, T::unsynced(), 0)),
        }
    }

    async fn synced(&self, entity_id: &EntityId) -> Result<Option<Synced<T>>> {
        let row = query_as::<_, SyncedRow>(
            "SELECT entity_id, value, modified_at FROM synced_params WHERE param = ? AND entity_id = ?",
        )
        .bind(&self.param)
        .bind(entity_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Synced::try_from).transpose()
    }

    async fn save(&self, synced: &Synced<T>) -> Result<()> {
        let value = serde_json::to_string(synced.get())?;

        query(
            r#"
            INSERT INTO synced_params (param, entity_id, value, modified_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(param, entity_id) DO UPDATE SET
                value = excluded.value,
                modified_at = excluded.modified_at
            "#,
        )
        .bind(&self.param)
        .bind(synced.entity_id.to_string())
        .bind(value)
        .bind(synced.modified_at())
        .execute(&self.pool)
        .await?;

        debug!(param = %self.param, entity_id = %synced.entity_id, value = ?synced.get(), "Saved parameter");
        Ok(())
    }

    async fn synced_newer_than(&self, since: i64) -> Result<HashMap<EntityId, Synced<T>>> {
        let rows = query_as::<_, SyncedRow>(
            "SELECT entity_id, value, modified_at FROM synced_params WHERE param = ? AND modified_at > ?",
        )
        .bind(&self.param)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Self::collect(rows)
    }

    async fn synced_older_than(&self, since: i64) -> Result<HashMap<EntityId, Synced<T>>> {
        let rows = query_as::<_, SyncedRow>(
            "SELECT entity_id, value, modified_at FROM synced_params WHERE param = ? AND modified_at <= ?",
        )
        .bind(&self.param)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Self::collect(rows)
    }

    async fn delete_unsynced(&self) -> Result<u64> {
        let unsynced = serde_json::to_string(&T::unsynced())?;

        let result = query("DELETE FROM synced_params WHERE param = ? AND value = ?")
            .bind(&self.param)
            .bind(unsynced)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            info!(param = %self.param, deleted = result.rows_affected(), "Deleted unsynced parameters");
        }
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::repositories::{EntityRepository, SqliteEntityRepository};
    use bridge_traits::{ManualClock, WorkKind};
    use std::sync::Arc;

    async fn setup() -> (SqliteEntityRepository, SqlitePool) {
        let pool = create_test_pool().await.unwrap();
        let entities = SqliteEntityRepository::new(pool.clone(), Arc::new(ManualClock::new(0)));
        (entities, pool)
    }

    #[tokio::test]
    async fn test_create_synced_starts_unsynced() {
        let (entities, pool) = setup().await;
        let repo = SqliteSyncRepository::<bool>::new(pool, "liked");
        let id = entities.create_entity(WorkKind::Album).await.unwrap();

        let created = repo.create_synced(&id).await.unwrap();
        assert!(!*created.get());
        assert_eq!(created.modified_at(), 0);

        let mut liked = created.clone();
        liked.set(true, 50);
        repo.save(&liked).await.unwrap();

        // idempotent
        let again = repo.create_synced(&id).await.unwrap();
        assert!(*again.get());
        assert_eq!(again.modified_at(), 50);
    }

    #[tokio::test]
    async fn test_newer_and_older_partition_on_timestamp() {
        let (entities, pool) = setup().await;
        let repo = SqliteSyncRepository::<bool>::new(pool, "liked");

        let old = entities.create_entity(WorkKind::Track).await.unwrap();
        let tie = entities.create_entity(WorkKind::Track).await.unwrap();
        let new = entities.create_entity(WorkKind::Track).await.unwrap();
        repo.save(&Synced::new(old, true, 10)).await.unwrap();
        repo.save(&Synced::new(tie, true, 20)).await.unwrap();
        repo.save(&Synced::new(new, true, 30)).await.unwrap();

        let newer = repo.synced_newer_than(20).await.unwrap();
        let older = repo.synced_older_than(20).await.unwrap();

        assert_eq!(newer.keys().collect::<Vec<_>>(), vec![&new]);
        assert_eq!(older.len(), 2);
        assert!(older.contains_key(&old) && older.contains_key(&tie));
    }

    #[tokio::test]
    async fn test_params_are_isolated_and_typed() {
        let (entities, pool) = setup().await;
        let names = SqliteSyncRepository::<String>::new(pool.clone(), "playlist.name");
        let liked = SqliteSyncRepository::<bool>::new(pool, "liked");
        let id = entities.create_entity(WorkKind::Playlist).await.unwrap();

        names
            .save(&Synced::new(id, "Road Trip".to_string(), 5))
            .await
            .unwrap();

        assert_eq!(names.synced(&id).await.unwrap().unwrap().get(), "Road Trip");
        assert!(liked.synced(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_unsynced() {
        let (entities, pool) = setup().await;
        let repo = SqliteSyncRepository::<bool>::new(pool, "liked");
        let kept = entities.create_entity(WorkKind::Album).await.unwrap();
        let dropped = entities.create_entity(WorkKind::Album).await.unwrap();

        repo.save(&Synced::new(kept, true, 1)).await.unwrap();
        repo.save(&Synced::new(dropped, false, 1)).await.unwrap();

        assert_eq!(repo.delete_unsynced().await.unwrap(), 1);
        assert!(repo.synced(&kept).await.unwrap().is_some());
        assert!(repo.synced(&dropped).await.unwrap().is_none());
    }
}

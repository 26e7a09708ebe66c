//! Per-account observation watermark

use crate::error::Result;
use crate::models::AccountLastSync;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Where each account's remote side was last observed, per attribute class.
#[async_trait]
pub trait LastSyncRepository: Send + Sync {
    /// Milliseconds since the epoch; 0 for an account that never synced.
    async fn get(&self, account: &str, class: &str) -> Result<i64>;

    async fn set(&self, account: &str, class: &str, synced_at: i64) -> Result<()>;

    async fn all(&self) -> Result<Vec<AccountLastSync>>;

    /// Forget every account's watermark for `class`.
    async fn clear(&self, class: &str) -> Result<u64>;
}

pub struct SqliteLastSyncRepository {
    pool: SqlitePool,
}

impl SqliteLastSyncRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LastSyncRepository for SqliteLastSyncRepository {
    async fn get(&self, account: &str, class: &str) -> Result<i64> {
        let row: Option<(i64,)> =
            query_as("SELECT synced_at FROM account_last_sync WHERE account = ? AND class = ?")
                .bind(account)
                .bind(class)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(at,)| at).unwrap_or(0))
    }

    async fn set(&self, account: &str, class: &str, synced_at: i64) -> Result<()> {
        query(
            r#"
            INSERT INTO account_last_sync (account, class, synced_at)
            VALUES (?, ?, ?)
            ON CONFLICT(account, class) DO UPDATE SET synced_at = excluded.synced_at
            "#,
        )
        .bind(account)
        .bind(class)
        .bind(synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn all(&self) -> Result<Vec<AccountLastSync>> {
        let rows = query_as::<_, AccountLastSync>(
            "SELECT account, class, synced_at FROM account_last_sync ORDER BY account, class",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn clear(&self, class: &str) -> Result<u64> {
        let result = query("DELETE FROM account_last_sync WHERE class = ?")
            .bind(class)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_never_synced_reads_zero() {
        let repo = SqliteLastSyncRepository::new(create_test_pool().await.unwrap());
        assert_eq!(repo.get("deezer-main", "albums").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_overwrites_per_class() {
        let repo = SqliteLastSyncRepository::new(create_test_pool().await.unwrap());

        repo.set("deezer-main", "albums", 100).await.unwrap();
        repo.set("deezer-main", "albums", 250).await.unwrap();
        repo.set("deezer-main", "tracks", 40).await.unwrap();

        assert_eq!(repo.get("deezer-main", "albums").await.unwrap(), 250);
        assert_eq!(repo.get("deezer-main", "tracks").await.unwrap(), 40);
        assert_eq!(repo.all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_is_scoped_to_class() {
        let repo = SqliteLastSyncRepository::new(create_test_pool().await.unwrap());
        repo.set("deezer-main", "albums", 100).await.unwrap();
        repo.set("tidal-main", "albums", 100).await.unwrap();
        repo.set("tidal-main", "tracks", 100).await.unwrap();

        assert_eq!(repo.clear("albums").await.unwrap(), 2);
        assert_eq!(repo.get("tidal-main", "albums").await.unwrap(), 0);
        assert_eq!(repo.get("tidal-main", "tracks").await.unwrap(), 100);
    }
}

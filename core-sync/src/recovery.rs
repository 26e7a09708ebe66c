//! Compensating actions and held-back watermarks of one pass
//!
//! Every remote mutation that succeeds during a pass records how to undo it,
//! and every account/class that finishes records the last-sync stamp it
//! earned. Stamps are only written once the whole pass succeeded
//! ([`RecoveryLog::commit`]). When a later mutation of the same pass fails,
//! the coordinator replays the compensations backwards on a best-effort
//! basis and drops the stamps, so the next sync sees the reverted accounts
//! exactly as they were before the pass. This is not a transaction: an undo
//! that fails is logged and skipped.

use std::sync::{Mutex, MutexGuard, PoisonError};

use core_library::LastSyncRepository;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::account::AttributeClass;
use crate::error::Result;

type Undo = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

struct Compensation {
    description: String,
    undo: Undo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Stamp {
    account: String,
    class: AttributeClass,
    synced_at: i64,
}

#[derive(Default)]
pub struct RecoveryLog {
    actions: Mutex<Vec<Compensation>>,
    stamps: Mutex<Vec<Stamp>>,
}

// A panicking orchestrator must not make the log forget what it recorded.
fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecoveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record how to reverse a mutation that has just been applied.
    pub fn record<F>(&self, description: impl Into<String>, undo: F)
    where
        F: FnOnce() -> BoxFuture<'static, Result<()>> + Send + 'static,
    {
        locked(&self.actions).push(Compensation {
            description: description.into(),
            undo: Box::new(undo),
        });
    }

    /// Hold back the last-sync stamp of an account/class until the pass
    /// commits.
    pub fn stamp(&self, account: &str, class: AttributeClass, synced_at: i64) {
        locked(&self.stamps).push(Stamp {
            account: account.to_string(),
            class,
            synced_at,
        });
    }

    pub fn len(&self) -> usize {
        locked(&self.actions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_stamps(&self) -> usize {
        locked(&self.stamps).len()
    }

    /// Write the held-back stamps and forget the compensations.
    pub async fn commit(&self, last_sync: &dyn LastSyncRepository) -> Result<usize> {
        let stamps = std::mem::take(&mut *locked(&self.stamps));
        locked(&self.actions).clear();

        for stamp in &stamps {
            last_sync
                .set(&stamp.account, stamp.class.as_str(), stamp.synced_at)
                .await?;
        }
        debug!(stamps = stamps.len(), "Pass committed");
        Ok(stamps.len())
    }

    /// Undo recorded mutations, newest first, and drop the held-back stamps.
    /// Returns how many undos succeeded.
    pub async fn recover(&self) -> u64 {
        let dropped = std::mem::take(&mut *locked(&self.stamps)).len();
        let actions = std::mem::take(&mut *locked(&self.actions));
        debug!(stamps = dropped, actions = actions.len(), "Recovering pass");

        let mut recovered = 0;
        for compensation in actions.into_iter().rev() {
            match (compensation.undo)().await {
                Ok(()) => {
                    recovered += 1;
                    info!(action = %compensation.description, "Reverted remote mutation");
                }
                Err(e) => {
                    warn!(action = %compensation.description, error = %e, "Failed to revert remote mutation");
                }
            }
        }
        recovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use bridge_traits::BridgeError;
    use core_library::db::create_test_pool;
    use core_library::SqliteLastSyncRepository;
    use futures::FutureExt;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_recover_runs_newest_first_and_skips_failures() {
        let log = RecoveryLog::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 1..=3 {
            let order = order.clone();
            log.record(format!("action {n}"), move || {
                async move {
                    order.lock().unwrap().push(n);
                    if n == 2 {
                        Err(SyncError::Remote(BridgeError::Network("reset".into())))
                    } else {
                        Ok(())
                    }
                }
                .boxed()
            });
        }

        assert_eq!(log.len(), 3);
        assert_eq!(log.recover().await, 2);
        assert_eq!(*order.lock().unwrap(), vec![3, 2, 1]);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_commit_writes_stamps_and_forgets_actions() {
        let repo = SqliteLastSyncRepository::new(create_test_pool().await.unwrap());
        let log = RecoveryLog::new();
        log.record("noop", || async { Ok(()) }.boxed());
        log.stamp("deezer-main", AttributeClass::Albums, 1_500);

        assert_eq!(log.commit(&repo).await.unwrap(), 1);
        assert_eq!(repo.get("deezer-main", "albums").await.unwrap(), 1_500);
        assert_eq!(log.recover().await, 0);
    }

    #[tokio::test]
    async fn test_recover_drops_stamps() {
        let repo = SqliteLastSyncRepository::new(create_test_pool().await.unwrap());
        let log = RecoveryLog::new();
        log.stamp("tidal-main", AttributeClass::Tracks, 2_000);

        log.recover().await;

        assert_eq!(log.pending_stamps(), 0);
        assert_eq!(log.commit(&repo).await.unwrap(), 0);
        assert_eq!(repo.get("tidal-main", "tracks").await.unwrap(), 0);
    }

    #[test]
    fn test_poisoned_log_keeps_recording() {
        let log = Arc::new(RecoveryLog::new());
        let poisoner = log.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.actions.lock().unwrap();
            panic!("orchestrator panicked");
        })
        .join();

        log.record("after panic", || async { Ok(()) }.boxed());
        assert_eq!(log.len(), 1);
    }
}

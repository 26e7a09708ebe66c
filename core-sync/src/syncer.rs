//! Generic two-sided syncer
//!
//! Reconciles one timestamped scalar per entity between the persisted store
//! and what a single account currently shows. The account's last-sync
//! watermark decides who wins a disagreement:
//!
//! | persisted `modified_at` | winner    |
//! |-------------------------|-----------|
//! | `<= last_sync`          | remote    |
//! | `>  last_sync`          | persisted |
//!
//! Ties favor the remote side. Values the persisted side wins are returned
//! as deltas for the caller to turn into remote mutations.

use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::Clock;
use core_library::{EntityId, SyncRepository, SyncValue, Synced};
use tracing::{debug, instrument};

use crate::error::Result;

/// Outcome of pulling one account's observation into the persisted store.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound<T> {
    /// Parameters seen for the first time.
    pub created: u64,
    /// Persisted values replaced by the remote value.
    pub pulled: u64,
    /// Observed entities whose remote value must change to the persisted one.
    pub outbound: HashMap<EntityId, T>,
}

/// Persisted values the account does not reflect.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound<T> {
    /// Observed, but the persisted value changed since the last sync.
    pub outbound: HashMap<EntityId, T>,
    /// Not observed and changed since the last sync.
    pub new: HashMap<EntityId, T>,
    /// Not observed and unchanged since the last sync: the account dropped it.
    pub old: HashMap<EntityId, T>,
}

/// Both directions of one reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation<T> {
    pub created: u64,
    pub pulled: u64,
    pub outbound: HashMap<EntityId, T>,
    pub new: HashMap<EntityId, T>,
    pub old: HashMap<EntityId, T>,
}

pub struct Syncer<T: SyncValue> {
    repo: Arc<dyn SyncRepository<T>>,
    clock: Arc<dyn Clock>,
}

impl<T: SyncValue> Syncer<T> {
    pub fn new(repo: Arc<dyn SyncRepository<T>>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub fn param(&self) -> &str {
        self.repo.param()
    }

    pub fn repository(&self) -> &Arc<dyn SyncRepository<T>> {
        &self.repo
    }

    /// Pull observed remote values into the persisted store.
    #[instrument(skip(self, observed), fields(param = %self.param(), observed = observed.len()))]
    pub async fn from_remote(
        &self,
        observed: &HashMap<EntityId, T>,
        last_sync: i64,
    ) -> Result<Inbound<T>> {
        let mut inbound = Inbound {
            created: 0,
            pulled: 0,
            outbound: HashMap::new(),
        };

        for (entity_id, remote) in observed {
            match self.repo.synced(entity_id).await? {
                None => {
                    self.repo.create_synced(entity_id).await?;
                    // stamped even when it equals the unsynced value
                    let synced = Synced::new(*entity_id, remote.clone(), self.now());
                    self.repo.save(&synced).await?;
                    inbound.created += 1;
                }
                Some(persisted) if persisted.get() == remote => {}
                Some(mut persisted) if last_sync >= persisted.modified_at() => {
                    debug!(entity_id = %entity_id, from = ?persisted.get(), to = ?remote, "Remote value wins");
                    persisted.set(remote.clone(), self.now());
                    self.repo.save(&persisted).await?;
                    inbound.pulled += 1;
                }
                Some(persisted) => {
                    inbound.outbound.insert(*entity_id, persisted.get().clone());
                }
            }
        }

        Ok(inbound)
    }

    /// Find persisted values the account does not reflect.
    #[instrument(skip(self, observed), fields(param = %self.param(), observed = observed.len()))]
    pub async fn to_remote(
        &self,
        observed: &HashMap<EntityId, T>,
        last_sync: i64,
    ) -> Result<Outbound<T>> {
        let mut outbound = Outbound {
            outbound: HashMap::new(),
            new: HashMap::new(),
            old: HashMap::new(),
        };

        for (entity_id, persisted) in self.repo.synced_newer_than(last_sync).await? {
            match observed.get(&entity_id) {
                Some(remote) if remote == persisted.get() => {}
                Some(_) => {
                    outbound.outbound.insert(entity_id, persisted.get().clone());
                }
                None => {
                    outbound.new.insert(entity_id, persisted.get().clone());
                }
            }
        }

        for (entity_id, persisted) in self.repo.synced_older_than(last_sync).await? {
            if !observed.contains_key(&entity_id) {
                outbound.old.insert(entity_id, persisted.get().clone());
            }
        }

        Ok(outbound)
    }

    /// Pull, then compute what to push.
    pub async fn reconcile(
        &self,
        observed: &HashMap<EntityId, T>,
        last_sync: i64,
    ) -> Result<Reconciliation<T>> {
        let inbound = self.from_remote(observed, last_sync).await?;
        let outbound = self.to_remote(observed, last_sync).await?;

        let mut merged = inbound.outbound;
        merged.extend(outbound.outbound);

        debug!(
            param = %self.param(),
            created = inbound.created,
            pulled = inbound.pulled,
            outbound = merged.len(),
            new = outbound.new.len(),
            old = outbound.old.len(),
            "Reconciled"
        );

        Ok(Reconciliation {
            created: inbound.created,
            pulled: inbound.pulled,
            outbound: merged,
            new: outbound.new,
            old: outbound.old,
        })
    }

    /// Persist a value decided by an orchestrator. Returns whether it changed.
    pub async fn set(&self, entity_id: &EntityId, value: T) -> Result<bool> {
        let mut synced = match self.repo.synced(entity_id).await? {
            Some(synced) => synced,
            None => self.repo.create_synced(entity_id).await?,
        };
        if synced.set(value, self.now()) {
            self.repo.save(&synced).await?;
            return Ok(true);
        }
        Ok(false)
    }

    pub async fn get(&self, entity_id: &EntityId) -> Result<Option<T>> {
        Ok(self.repo.synced(entity_id).await?.map(|s| s.get().clone()))
    }

    fn now(&self) -> i64 {
        self.clock.unix_timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{ManualClock, WorkKind};
    use core_library::db::create_test_pool;
    use core_library::{EntityRepository, SqliteEntityRepository, SqliteSyncRepository};

    struct Fixture {
        syncer: Syncer<bool>,
        repo: Arc<SqliteSyncRepository<bool>>,
        entities: SqliteEntityRepository,
    }

    async fn setup(now: i64) -> Fixture {
        let pool = create_test_pool().await.unwrap();
        let clock = Arc::new(ManualClock::new(now));
        let repo = Arc::new(SqliteSyncRepository::<bool>::new(pool.clone(), "liked"));
        Fixture {
            syncer: Syncer::new(repo.clone(), clock.clone()),
            repo,
            entities: SqliteEntityRepository::new(pool, clock),
        }
    }

    impl Fixture {
        async fn entity_with(&self, value: bool, modified_at: i64) -> EntityId {
            let id = self.entities.create_entity(WorkKind::Album).await.unwrap();
            self.repo.save(&Synced::new(id, value, modified_at)).await.unwrap();
            id
        }
    }

    #[tokio::test]
    async fn test_unknown_remote_value_is_created() {
        let f = setup(500).await;
        let id = f.entities.create_entity(WorkKind::Album).await.unwrap();

        let inbound = f
            .syncer
            .from_remote(&HashMap::from([(id, true)]), 0)
            .await
            .unwrap();

        assert_eq!(inbound.created, 1);
        let stored = f.repo.synced(&id).await.unwrap().unwrap();
        assert!(*stored.get());
        assert_eq!(stored.modified_at(), 500);
    }

    #[tokio::test]
    async fn test_first_contact_with_default_value_is_stamped() {
        let f = setup(500).await;
        let id = f.entities.create_entity(WorkKind::Playlist).await.unwrap();

        f.syncer
            .from_remote(&HashMap::from([(id, false)]), 0)
            .await
            .unwrap();
        assert_eq!(f.repo.synced(&id).await.unwrap().unwrap().modified_at(), 500);

        // an account never synced before does not override it
        let other = f
            .syncer
            .from_remote(&HashMap::from([(id, true)]), 0)
            .await
            .unwrap();
        assert_eq!(other.pulled, 0);
        assert_eq!(other.outbound, HashMap::from([(id, false)]));
    }

    #[tokio::test]
    async fn test_remote_wins_when_persisted_is_not_newer_than_last_sync() {
        let f = setup(500).await;
        let stale = f.entity_with(false, 100).await;
        let tied = f.entity_with(false, 200).await;

        let observed = HashMap::from([(stale, true), (tied, true)]);
        let inbound = f.syncer.from_remote(&observed, 200).await.unwrap();

        assert_eq!(inbound.pulled, 2);
        assert!(inbound.outbound.is_empty());
        assert!(*f.repo.synced(&tied).await.unwrap().unwrap().get());
    }

    #[tokio::test]
    async fn test_persisted_wins_when_newer_than_last_sync() {
        let f = setup(500).await;
        let id = f.entity_with(false, 300).await;

        let observed = HashMap::from([(id, true)]);
        let inbound = f.syncer.from_remote(&observed, 200).await.unwrap();

        assert_eq!(inbound.pulled, 0);
        assert_eq!(inbound.outbound, HashMap::from([(id, false)]));
        assert!(!*f.repo.synced(&id).await.unwrap().unwrap().get());
    }

    #[tokio::test]
    async fn test_to_remote_partitions_new_and_old() {
        let f = setup(500).await;
        let observed_newer = f.entity_with(false, 300).await;
        let unobserved_newer = f.entity_with(true, 300).await;
        let unobserved_older = f.entity_with(true, 100).await;
        let observed_older = f.entity_with(true, 100).await;

        let observed = HashMap::from([(observed_newer, true), (observed_older, true)]);
        let out = f.syncer.to_remote(&observed, 200).await.unwrap();

        assert_eq!(out.outbound, HashMap::from([(observed_newer, false)]));
        assert_eq!(out.new, HashMap::from([(unobserved_newer, true)]));
        assert_eq!(out.old, HashMap::from([(unobserved_older, true)]));
    }

    #[tokio::test]
    async fn test_reconcile_merges_outbound() {
        let f = setup(500).await;
        let id = f.entity_with(false, 300).await;

        let rec = f
            .syncer
            .reconcile(&HashMap::from([(id, true)]), 200)
            .await
            .unwrap();

        assert_eq!(rec.outbound.len(), 1);
        assert!(rec.new.is_empty() && rec.old.is_empty());
    }

    #[tokio::test]
    async fn test_set_creates_and_stamps() {
        let f = setup(700).await;
        let id = f.entities.create_entity(WorkKind::Track).await.unwrap();

        assert!(f.syncer.set(&id, true).await.unwrap());
        assert!(!f.syncer.set(&id, true).await.unwrap());
        assert_eq!(f.syncer.get(&id).await.unwrap(), Some(true));
        assert_eq!(f.repo.synced(&id).await.unwrap().unwrap().modified_at(), 700);
    }
}

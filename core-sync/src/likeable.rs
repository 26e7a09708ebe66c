//! Liked-set orchestrator
//!
//! Binds the generic syncer to "is this work liked" for one attribute class.
//! Per account:
//!
//! 1. Link every liked work (`Linker::from_remote`) and observe it as `true`.
//! 2. Reconcile against the persisted liked state.
//! 3. Outbound `false` values become the unlike batch; new `true` values are
//!    resolved on the account's service (`Linker::to_remote`) and become the
//!    like batch. Works that cannot be resolved are counted, not failed.
//! 4. A previously synced like the account no longer shows was either
//!    unliked by the user or removed from the catalog. The former is pulled
//!    as `false`; the latter marks the link missing and searches again.
//! 5. Apply both batches, recording how to undo each. The account's
//!    last-sync stamp is handed to the recovery log and written only when
//!    the whole pass succeeds.

use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::{cancellable, CancellationToken, Clock, LikedLibrary};
use core_library::{EntityId, LastSyncRepository};
use core_link::{LinkError, Linker, Matchable};
use core_runtime::logging::redact_if_sensitive;
use futures::FutureExt;
use tracing::{debug, info, instrument, warn};

use crate::account::AttributeClass;
use crate::error::{Result, SyncError};
use crate::recovery::RecoveryLog;
use crate::report::{Housekeeping, PassStats};
use crate::syncer::Syncer;

/// Where an entity resolved on the account's service.
pub(crate) enum Resolution {
    Found(String),
    Missing,
    Broken,
}

/// Resolve an entity on `service`, treating broken links as unresolvable.
pub(crate) async fn resolve<W: Matchable>(
    linker: &Linker<W>,
    entity_id: &EntityId,
    service: &str,
    cancel: &CancellationToken,
) -> Result<Resolution> {
    match linker.to_remote(entity_id, service, cancel).await {
        Ok(result) => Ok(match result.linked.remote_id {
            Some(remote_id) => Resolution::Found(remote_id),
            None => Resolution::Missing,
        }),
        Err(LinkError::BrokenLinks { .. }) => {
            warn!(entity_id = %entity_id, service, "Entity has no concrete link on any service");
            Ok(Resolution::Broken)
        }
        Err(e) => Err(e.into()),
    }
}

pub struct LikeableSync<W: Matchable> {
    class: AttributeClass,
    linker: Arc<Linker<W>>,
    liked: Syncer<bool>,
    last_sync: Arc<dyn LastSyncRepository>,
    clock: Arc<dyn Clock>,
}

impl<W: Matchable> LikeableSync<W> {
    pub fn new(
        linker: Arc<Linker<W>>,
        liked: Syncer<bool>,
        last_sync: Arc<dyn LastSyncRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            class: AttributeClass::of(W::KIND),
            linker,
            liked,
            last_sync,
            clock,
        }
    }

    pub fn class(&self) -> AttributeClass {
        self.class
    }

    pub fn linker(&self) -> &Arc<Linker<W>> {
        &self.linker
    }

    /// Reconcile one account's liked collection.
    #[instrument(
        skip(self, library, recovery, cancel),
        fields(class = %self.class, account = %redact_if_sensitive("account", account), service = %library.service_name())
    )]
    pub async fn sync_account(
        &self,
        account: &str,
        library: Arc<dyn LikedLibrary<W>>,
        recovery: &RecoveryLog,
        cancel: &CancellationToken,
    ) -> Result<PassStats> {
        let service = library.service_name().to_string();
        let last_sync = self.last_sync.get(account, self.class.as_str()).await?;
        let mut stats = PassStats::default();

        let liked = cancellable(cancel, library.liked()).await?;
        let mut observed = HashMap::with_capacity(liked.len());
        let mut remote_ids = HashMap::with_capacity(liked.len());
        for work in &liked {
            let linked = self.linker.from_remote(work, cancel).await?;
            observed.insert(linked.entity_id, true);
            remote_ids.insert(linked.entity_id, work.id().to_string());
        }

        let reconciled = self.liked.reconcile(&observed, last_sync).await?;
        stats.imported += reconciled.created;
        stats.pulled += reconciled.pulled;

        let mut unlike: Vec<String> = reconciled
            .outbound
            .iter()
            .filter(|(_, liked)| !**liked)
            .filter_map(|(entity_id, _)| remote_ids.get(entity_id).cloned())
            .collect();

        let mut like = Vec::new();
        for (entity_id, _) in reconciled.new.iter().filter(|(_, liked)| **liked) {
            self.queue_like(entity_id, &service, &mut like, &mut stats, cancel)
                .await?;
        }

        for (entity_id, _) in reconciled.old.iter().filter(|(_, liked)| **liked) {
            let service_links = self.linker.service(&service)?;
            let current = service_links
                .linkables()
                .linked_by_entity(entity_id)
                .await?
                .and_then(|l| l.remote_id);

            if let Some(remote_id) = current {
                if service_links.fetch(&remote_id, cancel).await?.is_some() {
                    debug!(entity_id = %entity_id, remote_id, "Unliked on the account");
                    if self.liked.set(entity_id, false).await? {
                        stats.pulled += 1;
                    }
                    continue;
                }
                info!(entity_id = %entity_id, remote_id, "Liked work disappeared from the catalog");
                self.linker.mark_missing(entity_id, &service).await?;
            }

            self.queue_like(entity_id, &service, &mut like, &mut stats, cancel)
                .await?;
        }

        unlike.sort();
        unlike.dedup();
        like.sort();
        like.dedup();

        self.apply(&library, unlike, like, recovery, &mut stats, cancel)
            .await?;

        recovery.stamp(account, self.class, self.clock.unix_timestamp_millis());

        debug!(?stats, "Account synced");
        Ok(stats)
    }

    /// Delete liked records that are no longer liked anywhere, then entities
    /// without any concrete link.
    pub async fn housekeep(&self) -> Result<Housekeeping> {
        Ok(Housekeeping {
            params_deleted: self.liked.repository().delete_unsynced().await?,
            entities_deleted: self.linker.delete_not_linked().await?,
        })
    }

    async fn queue_like(
        &self,
        entity_id: &EntityId,
        service: &str,
        like: &mut Vec<String>,
        stats: &mut PassStats,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match resolve(&self.linker, entity_id, service, cancel).await? {
            Resolution::Found(remote_id) => like.push(remote_id),
            Resolution::Missing => stats.still_missing += 1,
            Resolution::Broken => stats.broken_links += 1,
        }
        Ok(())
    }

    async fn apply(
        &self,
        library: &Arc<dyn LikedLibrary<W>>,
        unlike: Vec<String>,
        like: Vec<String>,
        recovery: &RecoveryLog,
        stats: &mut PassStats,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let service = library.service_name().to_string();

        if !unlike.is_empty() {
            cancellable(cancel, library.unlike(&unlike)).await?;
            info!(count = unlike.len(), "Unliked");
            stats.unliked += unlike.len() as u64;

            let library = library.clone();
            let count = unlike.len();
            recovery.record(
                format!("unlike {} {} on {}", count, self.class, service),
                move || async move { library.like(&unlike).await.map_err(SyncError::from) }.boxed(),
            );
        }

        if !like.is_empty() {
            cancellable(cancel, library.like(&like)).await?;
            info!(count = like.len(), "Liked");
            stats.liked += like.len() as u64;

            let library = library.clone();
            let count = like.len();
            recovery.record(
                format!("like {} {} on {}", count, self.class, service),
                move || async move { library.unlike(&like).await.map_err(SyncError::from) }.boxed(),
            );
        }

        Ok(())
    }
}

//! Playlist metadata orchestrator
//!
//! Playlists the account owns are reconciled as three independent synced
//! parameters: existence, name and visibility. Existence decides creation
//! and deletion; name and visibility changes are only pushed to playlists
//! the account still has.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{cancellable, CancellationToken, Catalog, Clock, PlaylistLibrary, RemotePlaylist};
use core_library::{EntityId, LastSyncRepository};
use core_link::Linker;
use core_runtime::logging::redact_if_sensitive;
use futures::FutureExt;
use tracing::{debug, info, instrument, warn};

use crate::account::AttributeClass;
use crate::error::{Result, SyncError};
use crate::likeable::{resolve, Resolution};
use crate::recovery::RecoveryLog;
use crate::report::{Housekeeping, PassStats};
use crate::syncer::Syncer;

pub const EXISTS_PARAM: &str = "playlist";
pub const NAME_PARAM: &str = "playlist.name";
pub const PUBLIC_PARAM: &str = "playlist.public";

/// The account's own playlists seen as a catalog, so the linker can match
/// playlists across services by name.
pub struct OwnedPlaylists {
    library: Arc<dyn PlaylistLibrary>,
}

impl OwnedPlaylists {
    pub fn new(library: Arc<dyn PlaylistLibrary>) -> Self {
        Self { library }
    }
}

#[async_trait]
impl Catalog<RemotePlaylist> for OwnedPlaylists {
    fn service_name(&self) -> &str {
        self.library.service_name()
    }

    async fn search(&self, _query: &RemotePlaylist) -> BridgeResult<Vec<RemotePlaylist>> {
        self.library.playlists().await
    }

    async fn fetch(&self, id: &str) -> BridgeResult<Option<RemotePlaylist>> {
        Ok(self
            .library
            .playlists()
            .await?
            .into_iter()
            .find(|p| p.id == id))
    }
}

pub struct PlaylistSync {
    linker: Arc<Linker<RemotePlaylist>>,
    exists: Syncer<bool>,
    names: Syncer<String>,
    public: Syncer<bool>,
    last_sync: Arc<dyn LastSyncRepository>,
    clock: Arc<dyn Clock>,
}

impl PlaylistSync {
    pub fn new(
        linker: Arc<Linker<RemotePlaylist>>,
        exists: Syncer<bool>,
        names: Syncer<String>,
        public: Syncer<bool>,
        last_sync: Arc<dyn LastSyncRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            linker,
            exists,
            names,
            public,
            last_sync,
            clock,
        }
    }

    pub fn linker(&self) -> &Arc<Linker<RemotePlaylist>> {
        &self.linker
    }

    #[instrument(
        skip(self, library, recovery, cancel),
        fields(account = %redact_if_sensitive("account", account), service = %library.service_name())
    )]
    pub async fn sync_account(
        &self,
        account: &str,
        library: Arc<dyn PlaylistLibrary>,
        recovery: &RecoveryLog,
        cancel: &CancellationToken,
    ) -> Result<PassStats> {
        let class = AttributeClass::Playlists.as_str();
        let service = library.service_name().to_string();
        let last_sync = self.last_sync.get(account, class).await?;
        let mut stats = PassStats::default();

        let playlists = cancellable(cancel, library.playlists()).await?;
        let mut observed_exists = HashMap::new();
        let mut observed_names = HashMap::new();
        let mut observed_public = HashMap::new();
        let mut remote: HashMap<EntityId, RemotePlaylist> = HashMap::new();
        for playlist in playlists {
            let linked = self.linker.from_remote(&playlist, cancel).await?;
            observed_exists.insert(linked.entity_id, true);
            observed_names.insert(linked.entity_id, playlist.name.clone());
            observed_public.insert(linked.entity_id, playlist.public);
            remote.insert(linked.entity_id, playlist);
        }

        let exists = self.exists.reconcile(&observed_exists, last_sync).await?;
        let names = self.names.reconcile(&observed_names, last_sync).await?;
        let public = self.public.reconcile(&observed_public, last_sync).await?;
        for (created, pulled) in [
            (exists.created, exists.pulled),
            (names.created, names.pulled),
            (public.created, public.pulled),
        ] {
            stats.imported += created;
            stats.pulled += pulled;
        }

        // deleted on the account since the last sync
        for (entity_id, _) in exists.old.iter().filter(|(_, e)| **e) {
            if self.exists.set(entity_id, false).await? {
                stats.pulled += 1;
            }
            self.linker.mark_missing(entity_id, &service).await?;
        }

        // deleted elsewhere
        let mut deleted = HashSet::new();
        for (entity_id, _) in exists.outbound.iter().filter(|(_, e)| !**e) {
            let Some(playlist) = remote.get(entity_id) else {
                continue;
            };
            cancellable(cancel, library.delete_playlist(&playlist.id)).await?;
            info!(playlist = %playlist.name, "Deleted playlist");
            stats.playlists_deleted += 1;
            deleted.insert(*entity_id);
            self.linker.mark_missing(entity_id, &service).await?;

            let library = library.clone();
            let linker = self.linker.clone();
            let (entity_id, service, playlist) = (*entity_id, service.clone(), playlist.clone());
            recovery.record(format!("delete playlist {} on {}", playlist.name, service), move || {
                async move {
                    let restored = library
                        .create_playlist(&playlist.name, playlist.description.as_deref(), playlist.public)
                        .await?;
                    linker.link(&entity_id, &service, &restored.id).await?;
                    Ok::<(), SyncError>(())
                }
                .boxed()
            });
        }

        // created elsewhere
        for (entity_id, _) in exists.new.iter().filter(|(_, e)| **e) {
            match resolve(&self.linker, entity_id, &service, cancel).await? {
                Resolution::Found(remote_id) => {
                    debug!(entity_id = %entity_id, remote_id, "Playlist already on the account");
                }
                Resolution::Missing | Resolution::Broken => {
                    self.create(entity_id, &service, &library, recovery, &mut stats, cancel)
                        .await?;
                }
            }
        }

        for (entity_id, name) in &names.outbound {
            let Some(playlist) = remote.get(entity_id).filter(|_| !deleted.contains(entity_id)) else {
                continue;
            };
            cancellable(cancel, library.rename_playlist(&playlist.id, name)).await?;
            info!(from = %playlist.name, to = %name, "Renamed playlist");
            stats.renamed += 1;

            let library = library.clone();
            let (id, previous) = (playlist.id.clone(), playlist.name.clone());
            recovery.record(format!("rename playlist {} on {}", previous, service), move || {
                async move { library.rename_playlist(&id, &previous).await.map_err(SyncError::from) }.boxed()
            });
        }

        for (entity_id, is_public) in &public.outbound {
            let Some(playlist) = remote.get(entity_id).filter(|_| !deleted.contains(entity_id)) else {
                continue;
            };
            cancellable(cancel, library.set_playlist_public(&playlist.id, *is_public)).await?;
            debug!(playlist = %playlist.name, public = is_public, "Changed playlist visibility");
            stats.visibility_changed += 1;

            let library = library.clone();
            let (id, previous) = (playlist.id.clone(), playlist.public);
            recovery.record(format!("set visibility of {} on {}", playlist.name, service), move || {
                async move { library.set_playlist_public(&id, previous).await.map_err(SyncError::from) }.boxed()
            });
        }

        recovery.stamp(account, AttributeClass::Playlists, self.clock.unix_timestamp_millis());

        Ok(stats)
    }

    /// Visibility is left alone: `false` is a real value there, not the
    /// absence of one.
    pub async fn housekeep(&self) -> Result<Housekeeping> {
        let mut params_deleted = 0;
        params_deleted += self.exists.repository().delete_unsynced().await?;
        params_deleted += self.names.repository().delete_unsynced().await?;
        Ok(Housekeeping {
            params_deleted,
            entities_deleted: self.linker.delete_not_linked().await?,
        })
    }

    async fn create(
        &self,
        entity_id: &EntityId,
        service: &str,
        library: &Arc<dyn PlaylistLibrary>,
        recovery: &RecoveryLog,
        stats: &mut PassStats,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let name = self.names.get(entity_id).await?.unwrap_or_default();
        if name.is_empty() {
            warn!(entity_id = %entity_id, "Playlist without a name cannot be created");
            return Ok(());
        }
        let public = self.public.get(entity_id).await?.unwrap_or(false);

        let created = cancellable(cancel, library.create_playlist(&name, None, public)).await?;
        self.linker.link(entity_id, service, &created.id).await?;
        info!(playlist = %name, remote_id = %created.id, "Created playlist");
        stats.playlists_created += 1;

        let library = library.clone();
        let linker = self.linker.clone();
        let (entity_id, service) = (*entity_id, service.to_string());
        recovery.record(format!("create playlist {} on {}", name, service), move || {
            async move {
                library.delete_playlist(&created.id).await?;
                // the entity must be created again by the next sync
                linker.mark_missing(&entity_id, &service).await?;
                Ok::<(), SyncError>(())
            }
            .boxed()
        });
        Ok(())
    }
}

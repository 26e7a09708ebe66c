//! # Sync Coordinator
//!
//! Runs full syncs across every configured account.
//!
//! ## Workflow
//!
//! 1. Take the sync lease; a second concurrent `sync` is rejected with
//!    [`SyncError::SyncInProgress`].
//! 2. Ask the [`Snapshotter`] for an automatic snapshot when
//!    `max_auto_snapshots > 0`.
//! 3. Run link-and-reconcile passes until one changes nothing or
//!    `max_convergence_passes` is reached. Within a pass accounts run one
//!    after the other; the attribute classes of one account run concurrently
//!    since they touch disjoint entity spaces.
//! 4. When a pass fails on a remote error, undo the remote mutations it
//!    applied (if `auto_recover` is set). Cancellation and timeouts are never
//!    recovered.
//! 5. Reclaim unsynced parameters and unlinked entities.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{Account, SyncCoordinator};
//!
//! let coordinator = SyncCoordinator::builder()
//!     .pool(pool)
//!     .config(&config)
//!     .event_bus(bus.clone())
//!     .account(Account::new("me@deezer", "deezer").with_albums(catalog, library))
//!     .build()?;
//!
//! let report = coordinator.sync().await?;
//! println!("{}", report);
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bridge_traits::{
    CancellationToken, Catalog, Clock, HttpClient, RemoteAlbum, RemoteArtist, RemotePlaylist,
    RemoteTrack, SystemClock, WorkKind,
};
use chrono::{DateTime, Utc};
use core_library::{
    EntityRepository, LastSyncRepository, LinkRepository, SqliteEntityRepository,
    SqliteLastSyncRepository, SqliteLinkRepository, SqliteSyncRepository,
};
use core_link::{CoverHasher, LastObservedWins, LinkedService, Linker, Matchable, RelinkPolicy};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_runtime::{CoreConfig, SyncSettings};
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::account::{Account, AttributeClass};
use crate::error::{Result, SyncError};
use crate::likeable::LikeableSync;
use crate::meta::{OwnedPlaylists, PlaylistSync, EXISTS_PARAM, NAME_PARAM, PUBLIC_PARAM};
use crate::recovery::RecoveryLog;
use crate::report::{Housekeeping, PassStats, SyncReport};
use crate::snapshot::Snapshotter;
use crate::syncer::Syncer;

/// Name of the liked parameter of an attribute class.
pub fn liked_param(class: AttributeClass) -> String {
    format!("{}.liked", class)
}

/// Sync coordinator for every configured account
pub struct SyncCoordinator {
    settings: SyncSettings,
    clock: Arc<dyn Clock>,
    accounts: Vec<Account>,
    last_sync: Arc<dyn LastSyncRepository>,
    albums: LikeableSync<RemoteAlbum>,
    artists: LikeableSync<RemoteArtist>,
    tracks: LikeableSync<RemoteTrack>,
    playlists: PlaylistSync,
    snapshotter: Option<Arc<dyn Snapshotter>>,
    event_bus: Option<EventBus>,

    /// Held for the whole of a sync or reset.
    lease: Mutex<()>,

    /// Token of the running sync, if any.
    active: StdMutex<Option<CancellationToken>>,
}

/// A pass failure with the number of compensating actions that ran.
struct PassFailure {
    error: SyncError,
    recovered: u64,
}

impl SyncCoordinator {
    pub fn builder() -> SyncCoordinatorBuilder {
        SyncCoordinatorBuilder::default()
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Whether a sync currently holds the lease.
    pub fn is_syncing(&self) -> bool {
        self.lease.try_lock().is_err()
    }

    /// Cancel the running sync. Returns false when no sync is running.
    pub fn cancel(&self) -> bool {
        match self.active.lock() {
            Ok(active) => match active.as_ref() {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Run a full sync.
    ///
    /// # Errors
    ///
    /// - [`SyncError::SyncInProgress`] if another sync or reset is running
    /// - [`SyncError::Cancelled`] / [`SyncError::Timeout`] when stopped early
    /// - the first error of a failing pass, after recovery ran
    #[instrument(skip(self), fields(accounts = self.accounts.len()))]
    pub async fn sync(&self) -> Result<SyncReport> {
        let _lease = self.lease.try_lock().map_err(|_| SyncError::SyncInProgress)?;

        let cancel = CancellationToken::new();
        self.set_active(Some(cancel.clone()));
        let result = self.run(&cancel).await;
        self.set_active(None);
        result
    }

    /// Forget everything known about one work kind: entities, links,
    /// parameters and the last-sync stamps of its attribute class.
    #[instrument(skip(self))]
    pub async fn reset(&self, kind: WorkKind) -> Result<u64> {
        let _lease = self.lease.try_lock().map_err(|_| SyncError::SyncInProgress)?;

        let deleted = match kind {
            WorkKind::Album => self.albums.linker().delete_all().await?,
            WorkKind::Artist => self.artists.linker().delete_all().await?,
            WorkKind::Track => self.tracks.linker().delete_all().await?,
            WorkKind::Playlist => self.playlists.linker().delete_all().await?,
        };
        self.last_sync
            .clear(AttributeClass::of(kind).as_str())
            .await?;

        info!(kind = %kind, deleted, "Reset entity kind");
        Ok(deleted)
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<SyncReport> {
        let sync_id = Uuid::new_v4().to_string();
        let started_at = self.now();

        self.emit(SyncEvent::Started {
            sync_id: sync_id.clone(),
            accounts: self.accounts.len(),
        });
        info!(sync_id = %sync_id, "Sync started");

        let snapshot_taken = match self.take_snapshot().await {
            Ok(taken) => taken,
            Err(error) => {
                return Err(self.finish_failed(&sync_id, PassFailure { error, recovered: 0 }));
            }
        };

        let mut passes = Vec::new();
        for pass in 1..=self.settings.max_convergence_passes {
            match self.run_pass(pass, cancel).await {
                Ok(stats) => {
                    self.emit(SyncEvent::PassCompleted {
                        sync_id: sync_id.clone(),
                        pass,
                        changes: stats.changes(),
                    });
                    info!(pass, changes = stats.changes(), "Pass completed");
                    passes.push(stats);
                    if stats.changes() == 0 {
                        break;
                    }
                }
                Err(failure) => return Err(self.finish_failed(&sync_id, failure)),
            }
        }

        let housekeeping = match self.housekeep().await {
            Ok(housekeeping) => housekeeping,
            Err(error) => {
                return Err(self.finish_failed(&sync_id, PassFailure { error, recovered: 0 }));
            }
        };

        let report = SyncReport {
            sync_id: sync_id.clone(),
            started_at,
            finished_at: self.now(),
            snapshot_taken,
            passes,
            housekeeping,
        };

        if !report.converged() {
            warn!(
                passes = report.passes.len(),
                "Sync stopped before converging; the next sync continues"
            );
        }

        let totals = report.totals();
        self.emit(SyncEvent::Completed {
            sync_id,
            passes: report.passes.len() as u32,
            liked: totals.liked,
            unliked: totals.unliked,
            pulled: totals.pulled,
            still_missing: report.still_missing(),
            duration_ms: report.duration_ms(),
        });
        info!(%report, "Sync completed");

        Ok(report)
    }

    /// One link-and-reconcile pass over every account, bounded by the pass
    /// timeout. Last-sync stamps are written only when every account
    /// succeeded; remote mutations of a failed pass are undone when enabled.
    #[instrument(skip(self, cancel))]
    async fn run_pass(
        &self,
        pass: u32,
        cancel: &CancellationToken,
    ) -> std::result::Result<PassStats, PassFailure> {
        let recovery = RecoveryLog::new();
        let secs = self.settings.pass_timeout_secs;

        let result = match timeout(Duration::from_secs(secs), self.sync_accounts(&recovery, cancel)).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(SyncError::Timeout(secs))
            }
        };

        match result {
            Ok(stats) => {
                // every mutation already matches the persisted state; a
                // missing stamp only makes the next sync check again
                recovery
                    .commit(self.last_sync.as_ref())
                    .await
                    .map_err(|error| PassFailure { error, recovered: 0 })?;
                Ok(stats)
            }
            Err(error) if error.is_cancellation() => Err(PassFailure { error, recovered: 0 }),
            Err(error) => {
                let recovered = if self.settings.auto_recover && !recovery.is_empty() {
                    warn!(pass, actions = recovery.len(), error = %error, "Pass failed, reverting its remote mutations");
                    recovery.recover().await
                } else {
                    0
                };
                Err(PassFailure { error, recovered })
            }
        }
    }

    async fn sync_accounts(&self, recovery: &RecoveryLog, cancel: &CancellationToken) -> Result<PassStats> {
        let mut stats = PassStats::default();
        for account in &self.accounts {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            stats += self.sync_account(account, recovery, cancel).await?;
        }
        Ok(stats)
    }

    async fn sync_account(
        &self,
        account: &Account,
        recovery: &RecoveryLog,
        cancel: &CancellationToken,
    ) -> Result<PassStats> {
        let name = account.name();

        let albums = async {
            match &account.albums {
                Some(likeable) => {
                    self.albums
                        .sync_account(name, likeable.library.clone(), recovery, cancel)
                        .await
                }
                None => Ok(PassStats::default()),
            }
        };
        let artists = async {
            match &account.artists {
                Some(likeable) => {
                    self.artists
                        .sync_account(name, likeable.library.clone(), recovery, cancel)
                        .await
                }
                None => Ok(PassStats::default()),
            }
        };
        let tracks = async {
            match &account.tracks {
                Some(likeable) => {
                    self.tracks
                        .sync_account(name, likeable.library.clone(), recovery, cancel)
                        .await
                }
                None => Ok(PassStats::default()),
            }
        };
        let playlists = async {
            match &account.playlists {
                Some(library) => {
                    self.playlists
                        .sync_account(name, library.clone(), recovery, cancel)
                        .await
                }
                None => Ok(PassStats::default()),
            }
        };

        let (albums, artists, tracks, playlists) = futures::join!(albums, artists, tracks, playlists);

        let mut stats = PassStats::default();
        for result in [albums, artists, tracks, playlists] {
            stats += result?;
        }
        Ok(stats)
    }

    async fn take_snapshot(&self) -> Result<bool> {
        let keep = self.settings.max_auto_snapshots;
        match &self.snapshotter {
            Some(snapshotter) if keep > 0 => {
                snapshotter.auto_snapshot(keep).await?;
                info!(keep, "Automatic snapshot taken");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn housekeep(&self) -> Result<Housekeeping> {
        let mut total = Housekeeping::default();
        for housekeeping in [
            self.albums.housekeep().await?,
            self.artists.housekeep().await?,
            self.tracks.housekeep().await?,
            self.playlists.housekeep().await?,
        ] {
            total.params_deleted += housekeeping.params_deleted;
            total.entities_deleted += housekeeping.entities_deleted;
        }
        Ok(total)
    }

    fn finish_failed(&self, sync_id: &str, failure: PassFailure) -> SyncError {
        let PassFailure { error, recovered } = failure;

        if error.is_cancellation() {
            warn!(sync_id, error = %error, "Sync cancelled");
            self.emit(SyncEvent::Cancelled {
                sync_id: sync_id.to_string(),
                timed_out: matches!(error, SyncError::Timeout(_)),
            });
        } else {
            error!(sync_id, error = %error, recovered, "Sync failed");
            self.emit(SyncEvent::Failed {
                sync_id: sync_id.to_string(),
                message: error.to_string(),
                recovered,
            });
        }
        error
    }

    fn set_active(&self, token: Option<CancellationToken>) {
        if let Ok(mut active) = self.active.lock() {
            *active = token;
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Sync(event)).ok();
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SyncCoordinator`].
#[derive(Default)]
pub struct SyncCoordinatorBuilder {
    pool: Option<SqlitePool>,
    clock: Option<Arc<dyn Clock>>,
    settings: Option<SyncSettings>,
    http_client: Option<Arc<dyn HttpClient>>,
    event_bus: Option<EventBus>,
    snapshotter: Option<Arc<dyn Snapshotter>>,
    relink_policy: Option<Arc<dyn RelinkPolicy>>,
    accounts: Vec<Account>,
}

impl SyncCoordinatorBuilder {
    pub fn pool(mut self, pool: SqlitePool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Take clock, HTTP client and sync settings from a core configuration.
    pub fn config(mut self, config: &CoreConfig) -> Self {
        self.clock = Some(config.clock.clone());
        self.settings = Some(config.sync.clone());
        if let Some(http) = &config.http_client {
            self.http_client = Some(http.clone());
        }
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn settings(mut self, settings: SyncSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// HTTP client for cover downloads. Without one, covers never count as
    /// matching evidence.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn snapshotter(mut self, snapshotter: Arc<dyn Snapshotter>) -> Self {
        self.snapshotter = Some(snapshotter);
        self
    }

    pub fn relink_policy(mut self, policy: Arc<dyn RelinkPolicy>) -> Self {
        self.relink_policy = Some(policy);
        self
    }

    pub fn account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    /// Builds the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the pool is missing, the settings are
    /// invalid, or accounts are misconfigured. Account names must be unique,
    /// and since links are kept per service, so must their services.
    pub fn build(self) -> Result<SyncCoordinator> {
        let pool = self
            .pool
            .ok_or_else(|| SyncError::Config("database pool is required".to_string()))?;
        let settings = self.settings.unwrap_or_default();
        settings.validate()?;

        let mut names = HashSet::new();
        let mut services = HashSet::new();
        for account in &self.accounts {
            account.validate()?;
            if !names.insert(account.name()) {
                return Err(SyncError::Config(format!(
                    "duplicate account name: {}",
                    account.name()
                )));
            }
            if !services.insert(account.service()) {
                return Err(SyncError::Config(format!(
                    "more than one account on service {}",
                    account.service()
                )));
            }
        }

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let entities: Arc<dyn EntityRepository> =
            Arc::new(SqliteEntityRepository::new(pool.clone(), clock.clone()));
        let links: Arc<dyn LinkRepository> =
            Arc::new(SqliteLinkRepository::new(pool.clone(), clock.clone()));
        let last_sync: Arc<dyn LastSyncRepository> =
            Arc::new(SqliteLastSyncRepository::new(pool.clone()));
        let covers = Arc::new(CoverHasher::new(
            self.http_client,
            settings.cover_cache_capacity,
        ));
        let relink = self
            .relink_policy
            .unwrap_or_else(|| Arc::new(LastObservedWins) as Arc<dyn RelinkPolicy>);

        let wiring = Wiring {
            entities,
            links,
            covers,
            relink,
            events: self.event_bus.clone(),
            settings: &settings,
        };

        let albums = wiring.linker(
            self.accounts
                .iter()
                .filter_map(|a| a.albums.as_ref().map(|l| l.catalog.clone())),
        );
        let artists = wiring.linker(
            self.accounts
                .iter()
                .filter_map(|a| a.artists.as_ref().map(|l| l.catalog.clone())),
        );
        let tracks = wiring.linker(
            self.accounts
                .iter()
                .filter_map(|a| a.tracks.as_ref().map(|l| l.catalog.clone())),
        );
        let playlists = wiring.linker(self.accounts.iter().filter_map(|a| {
            a.playlists
                .as_ref()
                .map(|library| Arc::new(OwnedPlaylists::new(library.clone())) as Arc<dyn Catalog<RemotePlaylist>>)
        }));

        let liked = |class: AttributeClass| {
            Syncer::new(
                Arc::new(SqliteSyncRepository::<bool>::new(pool.clone(), liked_param(class))),
                clock.clone(),
            )
        };

        let playlists = PlaylistSync::new(
            playlists,
            Syncer::new(
                Arc::new(SqliteSyncRepository::<bool>::new(pool.clone(), EXISTS_PARAM)),
                clock.clone(),
            ),
            Syncer::new(
                Arc::new(SqliteSyncRepository::<String>::new(pool.clone(), NAME_PARAM)),
                clock.clone(),
            ),
            Syncer::new(
                Arc::new(SqliteSyncRepository::<bool>::new(pool.clone(), PUBLIC_PARAM)),
                clock.clone(),
            ),
            last_sync.clone(),
            clock.clone(),
        );

        info!(
            accounts = self.accounts.len(),
            snapshots = settings.max_auto_snapshots,
            passes = settings.max_convergence_passes,
            "Sync coordinator ready"
        );

        Ok(SyncCoordinator {
            albums: LikeableSync::new(albums, liked(AttributeClass::Albums), last_sync.clone(), clock.clone()),
            artists: LikeableSync::new(artists, liked(AttributeClass::Artists), last_sync.clone(), clock.clone()),
            tracks: LikeableSync::new(tracks, liked(AttributeClass::Tracks), last_sync.clone(), clock.clone()),
            playlists,
            last_sync,
            settings,
            clock,
            accounts: self.accounts,
            snapshotter: self.snapshotter,
            event_bus: self.event_bus,
            lease: Mutex::new(()),
            active: StdMutex::new(None),
        })
    }
}

/// Shared collaborators of every linker.
struct Wiring<'a> {
    entities: Arc<dyn EntityRepository>,
    links: Arc<dyn LinkRepository>,
    covers: Arc<CoverHasher>,
    relink: Arc<dyn RelinkPolicy>,
    events: Option<EventBus>,
    settings: &'a SyncSettings,
}

impl Wiring<'_> {
    fn linker<W: Matchable>(&self, catalogs: impl Iterator<Item = Arc<dyn Catalog<W>>>) -> Arc<Linker<W>> {
        let services = catalogs
            .map(|catalog| {
                Arc::new(LinkedService::new(
                    catalog,
                    self.links.clone(),
                    self.covers.clone(),
                    self.settings.enrich_cache_capacity,
                ))
            })
            .collect();

        let mut linker = Linker::new(self.entities.clone(), services, self.settings)
            .with_relink_policy(self.relink.clone());
        if let Some(bus) = &self.events {
            linker = linker.with_event_bus(bus.clone());
        }
        Arc::new(linker)
    }
}

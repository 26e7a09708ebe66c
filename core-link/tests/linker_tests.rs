//! Linker scenarios against an in-memory library and fake catalogs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{CancellationToken, Catalog, ManualClock, RemoteAlbum, RemoteTrack, RemoteWork, WorkKind};
use core_library::db::create_test_pool;
use core_library::{EntityRepository, LinkRepository, SqliteEntityRepository, SqliteLinkRepository};
use core_link::{CoverHasher, KeepExisting, LinkError, LinkedService, Linker, Matchable};
use core_runtime::events::{CoreEvent, EventBus, LinkEvent};
use core_runtime::SyncSettings;

// ============================================================================
// Fakes
// ============================================================================

struct FakeCatalog<W> {
    name: String,
    works: Mutex<Vec<W>>,
    searches: AtomicUsize,
}

impl<W: RemoteWork> FakeCatalog<W> {
    fn new(name: &str, works: Vec<W>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            works: Mutex::new(works),
            searches: AtomicUsize::new(0),
        })
    }

    fn add(&self, work: W) {
        self.works.lock().unwrap().push(work);
    }

    fn remove(&self, id: &str) {
        self.works.lock().unwrap().retain(|w| w.id() != id);
    }

    fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<W: RemoteWork> Catalog<W> for FakeCatalog<W> {
    fn service_name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &W) -> BridgeResult<Vec<W>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.works.lock().unwrap().clone())
    }

    async fn fetch(&self, id: &str) -> BridgeResult<Option<W>> {
        Ok(self.works.lock().unwrap().iter().find(|w| w.id() == id).cloned())
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    entities: Arc<SqliteEntityRepository>,
    links: Arc<SqliteLinkRepository>,
}

impl Harness {
    async fn new() -> Self {
        let pool = create_test_pool().await.unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        Self {
            entities: Arc::new(SqliteEntityRepository::new(pool.clone(), clock.clone())),
            links: Arc::new(SqliteLinkRepository::new(pool, clock)),
        }
    }

    fn service<W: Matchable>(&self, catalog: Arc<FakeCatalog<W>>) -> Arc<LinkedService<W>> {
        Arc::new(LinkedService::new(
            catalog,
            self.links.clone(),
            Arc::new(CoverHasher::disabled()),
            16,
        ))
    }

    fn linker<W: Matchable>(&self, services: Vec<Arc<LinkedService<W>>>, settings: &SyncSettings) -> Linker<W> {
        Linker::new(self.entities.clone(), services, settings)
    }
}

fn discovery(service: &str, id: &str) -> RemoteAlbum {
    RemoteAlbum::new(service, id, "Discovery")
        .with_artists(["Daft Punk"])
        .with_track_count(14)
        .with_release_year(2001)
}

// ============================================================================
// Inbound
// ============================================================================

#[tokio::test]
async fn test_upc_match_links_both_services_and_is_idempotent() {
    let h = Harness::new().await;
    let deezer = FakeCatalog::new("deezer", vec![discovery("deezer", "d1").with_upc("724384960650")]);
    let tidal = FakeCatalog::new(
        "tidal",
        vec![
            RemoteAlbum::new("tidal", "t-other", "Homework").with_artists(["Daft Punk"]),
            RemoteAlbum::new("tidal", "t1", "Discovery (Remastered)").with_upc("724384960650"),
        ],
    );
    let linker = h.linker(
        vec![h.service(deezer.clone()), h.service(tidal.clone())],
        &SyncSettings::default(),
    );
    let cancel = CancellationToken::new();

    let observed = discovery("deezer", "d1").with_upc("724384960650");
    let linked = linker.from_remote(&observed, &cancel).await.unwrap();

    assert_eq!(linked.service, "deezer");
    assert_eq!(linked.remote_id.as_deref(), Some("d1"));
    let on_tidal = h.links.find_by_entity(&linked.entity_id, "tidal").await.unwrap().unwrap();
    assert_eq!(on_tidal.remote_id.as_deref(), Some("t1"));
    assert_eq!(tidal.searches(), 1);

    let again = linker.from_remote(&observed, &cancel).await.unwrap();
    assert_eq!(again, linked);
    assert_eq!(tidal.searches(), 1);
    assert_eq!(h.entities.count(WorkKind::Album).await.unwrap(), 1);
}

#[tokio::test]
async fn test_unmatched_work_is_marked_missing() {
    let h = Harness::new().await;
    let deezer = FakeCatalog::new("deezer", vec![discovery("deezer", "d1")]);
    let tidal = FakeCatalog::new("tidal", vec![RemoteAlbum::new("tidal", "t9", "Random Access Memories")]);
    let linker = h.linker(vec![h.service(deezer), h.service(tidal)], &SyncSettings::default());

    let linked = linker
        .from_remote(&discovery("deezer", "d1"), &CancellationToken::new())
        .await
        .unwrap();

    let on_tidal = h.links.find_by_entity(&linked.entity_id, "tidal").await.unwrap().unwrap();
    assert!(on_tidal.is_missing());
}

#[tokio::test]
async fn test_matched_work_reuses_existing_entity() {
    let h = Harness::new().await;
    let deezer = FakeCatalog::new("deezer", Vec::new());
    let tidal = FakeCatalog::new("tidal", vec![discovery("tidal", "t1")]);
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let linker = h
        .linker(vec![h.service(deezer.clone()), h.service(tidal)], &SyncSettings::default())
        .with_event_bus(bus);
    let cancel = CancellationToken::new();

    // seen on tidal first, not yet on deezer
    let first = linker.from_remote(&discovery("tidal", "t1"), &cancel).await.unwrap();
    let on_deezer = h.links.find_by_entity(&first.entity_id, "deezer").await.unwrap().unwrap();
    assert!(on_deezer.is_missing());

    deezer.add(discovery("deezer", "d1"));
    let second = linker.from_remote(&discovery("deezer", "d1"), &cancel).await.unwrap();

    assert_eq!(second.entity_id, first.entity_id);
    assert_eq!(second.remote_id.as_deref(), Some("d1"));
    assert_eq!(h.entities.count(WorkKind::Album).await.unwrap(), 1);

    let mut found = false;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Link(LinkEvent::Found { service, remote_id, .. }) = event {
            found = service == "deezer" && remote_id == "d1";
        }
    }
    assert!(found);
}

/// Discovery linked on deezer (d1) and tidal (t1); tidal then replaces t1
/// with a reissue t2 carrying the same UPC.
async fn reissued_on_tidal(
    h: &Harness,
    linker: &Linker<RemoteAlbum>,
    tidal: &FakeCatalog<RemoteAlbum>,
) -> core_library::EntityId {
    let cancel = CancellationToken::new();
    let first = linker
        .from_remote(&discovery("deezer", "d1").with_upc("724384960650"), &cancel)
        .await
        .unwrap();
    let on_tidal = h.links.find_by_entity(&first.entity_id, "tidal").await.unwrap().unwrap();
    assert_eq!(on_tidal.remote_id.as_deref(), Some("t1"));

    tidal.remove("t1");
    tidal.add(discovery("tidal", "t2").with_upc("724384960650"));
    first.entity_id
}

#[tokio::test]
async fn test_fresh_match_overwrites_stored_link() {
    let h = Harness::new().await;
    let deezer = FakeCatalog::new("deezer", vec![discovery("deezer", "d1").with_upc("724384960650")]);
    let tidal = FakeCatalog::new("tidal", vec![discovery("tidal", "t1").with_upc("724384960650")]);
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let linker = h
        .linker(vec![h.service(deezer), h.service(tidal.clone())], &SyncSettings::default())
        .with_event_bus(bus);
    let entity_id = reissued_on_tidal(&h, &linker, &tidal).await;

    let linked = linker
        .from_remote(&discovery("tidal", "t2").with_upc("724384960650"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(linked.entity_id, entity_id);
    assert_eq!(linked.remote_id.as_deref(), Some("t2"));
    let links = h.links.links_for_entity(&entity_id).await.unwrap();
    assert_eq!(links.iter().filter(|l| l.service == "tidal").count(), 1);
    assert_eq!(links.iter().filter(|l| l.service == "deezer").count(), 1);
    assert_eq!(h.entities.count(WorkKind::Album).await.unwrap(), 1);

    let mut relinked = false;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Link(LinkEvent::Relinked { service, previous, current, .. }) = event {
            relinked = service == "tidal" && previous.as_deref() == Some("t1") && current == "t2";
        }
    }
    assert!(relinked);
}

#[tokio::test]
async fn test_keep_existing_policy_leaves_stored_link() {
    let h = Harness::new().await;
    let deezer = FakeCatalog::new("deezer", vec![discovery("deezer", "d1").with_upc("724384960650")]);
    let tidal = FakeCatalog::new("tidal", vec![discovery("tidal", "t1").with_upc("724384960650")]);
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let linker = h
        .linker(vec![h.service(deezer), h.service(tidal.clone())], &SyncSettings::default())
        .with_relink_policy(Arc::new(KeepExisting))
        .with_event_bus(bus);
    let entity_id = reissued_on_tidal(&h, &linker, &tidal).await;

    let linked = linker
        .from_remote(&discovery("tidal", "t2").with_upc("724384960650"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(linked.entity_id, entity_id);
    assert_eq!(linked.remote_id.as_deref(), Some("t1"));
    let links = h.links.links_for_entity(&entity_id).await.unwrap();
    assert_eq!(links.iter().filter(|l| l.service == "tidal").count(), 1);

    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, CoreEvent::Link(LinkEvent::Relinked { .. })));
    }
}

#[tokio::test]
async fn test_unknown_service_is_rejected() {
    let h = Harness::new().await;
    let deezer = FakeCatalog::new("deezer", Vec::<RemoteTrack>::new());
    let linker = h.linker(vec![h.service(deezer)], &SyncSettings::default());

    let err = linker
        .from_remote(&RemoteTrack::new("qobuz", "q1", "Aerodynamic"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::UnknownService(name) if name == "qobuz"));
}

// ============================================================================
// Outbound
// ============================================================================

#[tokio::test]
async fn test_to_remote_finds_previously_missing_work() {
    let h = Harness::new().await;
    let deezer = FakeCatalog::new("deezer", vec![discovery("deezer", "d1")]);
    let tidal = FakeCatalog::new("tidal", Vec::new());
    let linker = h.linker(
        vec![h.service(deezer), h.service(tidal.clone())],
        &SyncSettings::default(),
    );
    let cancel = CancellationToken::new();

    let linked = linker.from_remote(&discovery("deezer", "d1"), &cancel).await.unwrap();
    tidal.add(discovery("tidal", "t1"));

    let result = linker.to_remote(&linked.entity_id, "tidal", &cancel).await.unwrap();
    assert!(result.missing_before);
    assert!(!result.missing_now);
    assert!(!result.new_link);
    assert_eq!(result.remote_id(), Some("t1"));
}

#[tokio::test]
async fn test_to_remote_without_recheck_keeps_missing() {
    let h = Harness::new().await;
    let deezer = FakeCatalog::new("deezer", vec![discovery("deezer", "d1")]);
    let tidal = FakeCatalog::new("tidal", Vec::new());
    let settings = SyncSettings::default().with_recheck_missing(false);
    let linker = h.linker(vec![h.service(deezer), h.service(tidal.clone())], &settings);
    let cancel = CancellationToken::new();

    let linked = linker.from_remote(&discovery("deezer", "d1"), &cancel).await.unwrap();
    tidal.add(discovery("tidal", "t1"));
    let searches = tidal.searches();

    let result = linker.to_remote(&linked.entity_id, "tidal", &cancel).await.unwrap();
    assert!(result.missing_before && result.missing_now);
    assert_eq!(result.remote_id(), None);
    assert_eq!(tidal.searches(), searches);
}

#[tokio::test]
async fn test_to_remote_creates_link_when_absent() {
    let h = Harness::new().await;
    let deezer = FakeCatalog::new("deezer", vec![discovery("deezer", "d1")]);
    let tidal = FakeCatalog::new("tidal", vec![discovery("tidal", "t1")]);
    let deezer_service = h.service(deezer);
    let linker = h.linker(
        vec![deezer_service.clone(), h.service(tidal)],
        &SyncSettings::default().with_recheck_missing(false),
    );

    let entity_id = h.entities.create_entity(WorkKind::Album).await.unwrap();
    deezer_service.linkables().create_link(&entity_id, Some("d1")).await.unwrap();

    // an absent link is always searched, regardless of re-checking
    let result = linker
        .to_remote(&entity_id, "tidal", &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.new_link);
    assert!(!result.missing_before && !result.missing_now);
    assert_eq!(result.remote_id(), Some("t1"));
}

#[tokio::test]
async fn test_to_remote_without_concrete_links_is_broken() {
    let h = Harness::new().await;
    let deezer = FakeCatalog::new("deezer", Vec::<RemoteAlbum>::new());
    let tidal = FakeCatalog::new("tidal", Vec::<RemoteAlbum>::new());
    let linker = h.linker(vec![h.service(deezer), h.service(tidal)], &SyncSettings::default());

    let entity_id = h.entities.create_entity(WorkKind::Album).await.unwrap();
    linker.mark_missing(&entity_id, "deezer").await.unwrap();

    let err = linker
        .to_remote(&entity_id, "tidal", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::BrokenLinks { service, .. } if service == "tidal"));
}

#[tokio::test]
async fn test_to_remote_marks_missing_when_source_vanished() {
    let h = Harness::new().await;
    let deezer = FakeCatalog::new("deezer", Vec::<RemoteAlbum>::new());
    let tidal = FakeCatalog::new("tidal", vec![discovery("tidal", "t1")]);
    let deezer_service = h.service(deezer);
    let linker = h.linker(
        vec![deezer_service.clone(), h.service(tidal)],
        &SyncSettings::default(),
    );

    let entity_id = h.entities.create_entity(WorkKind::Album).await.unwrap();
    deezer_service.linkables().create_link(&entity_id, Some("gone")).await.unwrap();

    let result = linker
        .to_remote(&entity_id, "tidal", &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.missing_now && result.new_link);
    assert!(h.links.find_by_entity(&entity_id, "tidal").await.unwrap().unwrap().is_missing());
}

#[tokio::test]
async fn test_cancelled_token_aborts_matching() {
    let h = Harness::new().await;
    let deezer = FakeCatalog::new("deezer", vec![discovery("deezer", "d1")]);
    let tidal = FakeCatalog::new("tidal", vec![discovery("tidal", "t1")]);
    let linker = h.linker(vec![h.service(deezer), h.service(tidal)], &SyncSettings::default());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = linker
        .from_remote(&discovery("deezer", "d1"), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(h.entities.count(WorkKind::Album).await.unwrap(), 0);
}

#[tokio::test]
async fn test_housekeeping_deletes_entities_without_links() {
    let h = Harness::new().await;
    let deezer = FakeCatalog::new("deezer", Vec::<RemoteAlbum>::new());
    let linker = h.linker(vec![h.service(deezer)], &SyncSettings::default());

    let kept = h.entities.create_entity(WorkKind::Album).await.unwrap();
    linker.link(&kept, "deezer", "d1").await.unwrap();
    let dropped = h.entities.create_entity(WorkKind::Album).await.unwrap();
    linker.mark_missing(&dropped, "deezer").await.unwrap();

    assert_eq!(linker.delete_not_linked().await.unwrap(), 1);
    assert_eq!(linker.delete_all().await.unwrap(), 1);
}

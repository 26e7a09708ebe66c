//! A service as seen by the linker: its catalog, its links, and a cache of
//! works prepared for matching.

use std::num::NonZeroUsize;
use std::sync::Arc;

use bridge_traits::{cancellable, CancellationToken, Catalog};
use core_library::{LinkRepository, Linkables};
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::cover::CoverHasher;
use crate::error::Result;
use crate::matcher::Matchable;

pub struct LinkedService<W: Matchable> {
    catalog: Arc<dyn Catalog<W>>,
    linkables: Linkables,
    covers: Arc<CoverHasher>,
    /// Enriched works by remote id. Artist enrichment costs one discography
    /// lookup per candidate, and the same candidates come back for every
    /// work by the same artist.
    prepared: Mutex<LruCache<String, W>>,
}

impl<W: Matchable> LinkedService<W> {
    pub fn new(
        catalog: Arc<dyn Catalog<W>>,
        links: Arc<dyn LinkRepository>,
        covers: Arc<CoverHasher>,
        cache_capacity: usize,
    ) -> Self {
        let linkables = Linkables::new(links, catalog.service_name());
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            catalog,
            linkables,
            covers,
            prepared: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn name(&self) -> &str {
        self.linkables.service()
    }

    pub fn linkables(&self) -> &Linkables {
        &self.linkables
    }

    /// Enrich a work of this service and hash its covers.
    pub async fn prepare(&self, work: W, cancel: &CancellationToken) -> Result<W> {
        // a renamed work is prepared again
        if let Some(hit) = self
            .prepared
            .lock()
            .await
            .get(work.id())
            .filter(|hit| hit.name() == work.name())
        {
            return Ok(hit.clone());
        }

        let id = work.id().to_string();
        let mut work = cancellable(cancel, self.catalog.enrich(work)).await?;
        self.covers.fill(&mut work, cancel).await?;

        self.prepared.lock().await.put(id, work.clone());
        Ok(work)
    }

    /// Fetch and prepare a work by id; `None` if the catalog no longer has it.
    pub async fn fetch(&self, remote_id: &str, cancel: &CancellationToken) -> Result<Option<W>> {
        match cancellable(cancel, self.catalog.fetch(remote_id)).await? {
            Some(work) => Ok(Some(self.prepare(work, cancel).await?)),
            None => {
                debug!(service = %self.name(), remote_id, "Work no longer in catalog");
                Ok(None)
            }
        }
    }

    /// Find the work on this service equivalent to `query`.
    ///
    /// `query` must already be prepared by its own service. A query that
    /// belongs to this service is its own match.
    #[instrument(skip(self, query, cancel), fields(service = %self.name(), query = %query.name()))]
    pub async fn match_work(&self, query: &W, cancel: &CancellationToken) -> Result<Option<W>> {
        if query.service() == self.name() {
            return Ok(Some(query.clone()));
        }

        let candidates = cancellable(cancel, self.catalog.search(query)).await?;
        let mut prepared = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            prepared.push(self.prepare(candidate, cancel).await?);
        }

        let selected = query.select(&prepared).cloned();
        debug!(
            candidates = prepared.len(),
            matched = ?selected.as_ref().map(|w| w.id()),
            "Matched work"
        );
        Ok(selected)
    }
}

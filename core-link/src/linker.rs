//! Cross-service linker
//!
//! Maintains the mapping between canonical entities and the works they
//! denote on each service.
//!
//! ## Inbound
//!
//! [`Linker::from_remote`] turns a work observed on one service into an
//! entity: an existing link is reused as is; otherwise the work is matched on
//! every other service and all results are linked to one entity, creating it
//! if none of the matches is known yet.
//!
//! ## Outbound
//!
//! [`Linker::to_remote`] resolves an entity on a target service, searching
//! with the entity's works on the other services when the target link is
//! absent (or missing, when re-checking is enabled).

use std::sync::Arc;

use bridge_traits::CancellationToken;
use core_library::{EntityId, EntityRepository, Linked};
use core_runtime::events::{CoreEvent, EventBus, LinkEvent};
use core_runtime::SyncSettings;
use tracing::{debug, info, instrument, warn};

use crate::error::{LinkError, Result};
use crate::matcher::Matchable;
use crate::relink::{LastObservedWins, RelinkDecision, RelinkPolicy};
use crate::service::LinkedService;

/// Outcome of resolving an entity on a target service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToRemoteResult {
    /// The stored link was missing before resolution.
    pub missing_before: bool,
    /// The link is missing after resolution.
    pub missing_now: bool,
    /// No link existed before and one was created.
    pub new_link: bool,
    pub linked: Linked,
}

impl ToRemoteResult {
    /// Remote id to act on, if the entity exists on the service.
    pub fn remote_id(&self) -> Option<&str> {
        self.linked.remote_id.as_deref()
    }
}

pub struct Linker<W: Matchable> {
    entities: Arc<dyn EntityRepository>,
    services: Vec<Arc<LinkedService<W>>>,
    recheck_missing: bool,
    relink: Arc<dyn RelinkPolicy>,
    events: Option<EventBus>,
}

impl<W: Matchable> Linker<W> {
    pub fn new(
        entities: Arc<dyn EntityRepository>,
        services: Vec<Arc<LinkedService<W>>>,
        settings: &SyncSettings,
    ) -> Self {
        Self {
            entities,
            services,
            recheck_missing: settings.recheck_missing,
            relink: Arc::new(LastObservedWins),
            events: None,
        }
    }

    pub fn with_relink_policy(mut self, policy: Arc<dyn RelinkPolicy>) -> Self {
        self.relink = policy;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn service(&self, name: &str) -> Result<&Arc<LinkedService<W>>> {
        self.services
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| LinkError::UnknownService(name.to_string()))
    }

    pub fn services(&self) -> impl Iterator<Item = &Arc<LinkedService<W>>> {
        self.services.iter()
    }

    /// Link a work observed on its own service to an entity.
    ///
    /// Idempotent: a work that is already linked returns its link without
    /// touching any service. Returns the link on the work's service.
    #[instrument(skip(self, work, cancel), fields(kind = %W::KIND, service = %work.service(), remote_id = %work.id()))]
    pub async fn from_remote(&self, work: &W, cancel: &CancellationToken) -> Result<Linked> {
        let origin = self.service(work.service())?;
        if let Some(linked) = origin.linkables().linked_by_remote_id(work.id()).await? {
            return Ok(linked);
        }

        let query = origin.prepare(work.clone(), cancel).await?;

        let mut outcomes: Vec<(&Arc<LinkedService<W>>, Option<String>)> =
            Vec::with_capacity(self.services.len());
        for service in &self.services {
            let found = service.match_work(&query, cancel).await?;
            outcomes.push((service, found.map(|w| w.id().to_string())));
        }

        let mut reused = None;
        for (service, found) in &outcomes {
            if let Some(remote_id) = found {
                if let Some(existing) = service.linkables().linked_by_remote_id(remote_id).await? {
                    reused = Some(existing.entity_id);
                    break;
                }
            }
        }

        let entity_id = match reused {
            Some(entity_id) => {
                debug!(entity_id = %entity_id, "Reusing entity of a matched work");
                entity_id
            }
            None => {
                let entity_id = self.entities.create_entity(W::KIND).await?;
                self.emit(LinkEvent::EntityCreated {
                    entity_id: entity_id.to_string(),
                    kind: W::KIND.to_string(),
                });
                entity_id
            }
        };

        let mut origin_link = None;
        for (service, found) in outcomes {
            let linked = self.ensure_link(service, &entity_id, found.as_deref()).await?;
            if service.name() == origin.name() {
                origin_link = Some(linked);
            }
        }

        origin_link.ok_or_else(|| LinkError::UnknownService(work.service().to_string()))
    }

    /// Resolve an entity on `service`.
    ///
    /// # Errors
    ///
    /// [`LinkError::BrokenLinks`] when a search is needed but no other
    /// service holds a concrete link to search with.
    #[instrument(skip(self, cancel), fields(kind = %W::KIND))]
    pub async fn to_remote(
        &self,
        entity_id: &EntityId,
        service: &str,
        cancel: &CancellationToken,
    ) -> Result<ToRemoteResult> {
        let target = self.service(service)?;
        let existing = target.linkables().linked_by_entity(entity_id).await?;

        if let Some(linked) = &existing {
            if !linked.is_missing() || !self.recheck_missing {
                return Ok(ToRemoteResult {
                    missing_before: linked.is_missing(),
                    missing_now: linked.is_missing(),
                    new_link: false,
                    linked: linked.clone(),
                });
            }
        }

        let missing_before = existing.as_ref().is_some_and(Linked::is_missing);
        let new_link = existing.is_none();
        let mut searchable = false;

        for source in self.services.iter().filter(|s| s.name() != service) {
            let Some(remote_id) = source
                .linkables()
                .linked_by_entity(entity_id)
                .await?
                .and_then(|l| l.remote_id)
            else {
                continue;
            };
            searchable = true;

            let Some(work) = source.fetch(&remote_id, cancel).await? else {
                continue;
            };

            if let Some(found) = target.match_work(&work, cancel).await? {
                let linked = target.linkables().create_link(entity_id, Some(found.id())).await?;
                if missing_before {
                    info!(entity_id = %entity_id, service, remote_id = %found.id(), "Missing work found");
                    self.emit(LinkEvent::Found {
                        entity_id: entity_id.to_string(),
                        service: service.to_string(),
                        remote_id: found.id().to_string(),
                    });
                }
                return Ok(ToRemoteResult {
                    missing_before,
                    missing_now: false,
                    new_link,
                    linked,
                });
            }
        }

        if !searchable {
            warn!(entity_id = %entity_id, service, "No concrete link to search with");
            return Err(LinkError::BrokenLinks {
                entity_id: *entity_id,
                service: service.to_string(),
            });
        }

        let linked = match existing {
            Some(linked) => linked,
            None => self.mark_missing(entity_id, service).await?,
        };

        Ok(ToRemoteResult {
            missing_before,
            missing_now: true,
            new_link,
            linked,
        })
    }

    /// Record that the entity does not exist on `service` right now.
    pub async fn mark_missing(&self, entity_id: &EntityId, service: &str) -> Result<Linked> {
        let linked = self.service(service)?.linkables().create_link(entity_id, None).await?;
        debug!(entity_id = %entity_id, service, "Marked missing");
        self.emit(LinkEvent::MarkedMissing {
            entity_id: entity_id.to_string(),
            service: service.to_string(),
        });
        Ok(linked)
    }

    /// Link an entity to a known remote id, e.g. a playlist the sync just created.
    pub async fn link(&self, entity_id: &EntityId, service: &str, remote_id: &str) -> Result<Linked> {
        Ok(self
            .service(service)?
            .linkables()
            .create_link(entity_id, Some(remote_id))
            .await?)
    }

    /// Delete entities of this kind without any concrete link.
    pub async fn delete_not_linked(&self) -> Result<u64> {
        Ok(self.entities.delete_not_linked(W::KIND).await?)
    }

    /// Delete every entity of this kind, with their links and parameters.
    pub async fn delete_all(&self) -> Result<u64> {
        Ok(self.entities.delete_all(W::KIND).await?)
    }

    async fn ensure_link(
        &self,
        service: &LinkedService<W>,
        entity_id: &EntityId,
        found: Option<&str>,
    ) -> Result<Linked> {
        let linkables = service.linkables();
        let existing = linkables.linked_by_entity(entity_id).await?;

        match (existing, found) {
            (None, Some(remote_id)) => Ok(linkables.create_link(entity_id, Some(remote_id)).await?),
            (None, None) => self.mark_missing(entity_id, service.name()).await,
            // a failed search never downgrades a known link
            (Some(existing), None) => Ok(existing),
            (Some(existing), Some(remote_id)) if existing.remote_id.as_deref() == Some(remote_id) => {
                Ok(existing)
            }
            (Some(existing), Some(remote_id)) => match self.relink.resolve(&existing, remote_id) {
                RelinkDecision::Keep => Ok(existing),
                RelinkDecision::Overwrite => {
                    let linked = linkables.set_remote_id(entity_id, Some(remote_id)).await?;
                    let event = match existing.remote_id {
                        None => LinkEvent::Found {
                            entity_id: entity_id.to_string(),
                            service: service.name().to_string(),
                            remote_id: remote_id.to_string(),
                        },
                        previous => {
                            info!(entity_id = %entity_id, service = %service.name(), ?previous, current = remote_id, "Relinked");
                            LinkEvent::Relinked {
                                entity_id: entity_id.to_string(),
                                service: service.name().to_string(),
                                previous,
                                current: remote_id.to_string(),
                            }
                        }
                    };
                    self.emit(event);
                    Ok(linked)
                }
            },
        }
    }

    fn emit(&self, event: LinkEvent) {
        if let Some(events) = &self.events {
            // no subscriber is not an error
            let _ = events.emit(CoreEvent::Link(event));
        }
    }
}

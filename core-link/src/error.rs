use bridge_traits::error::BridgeError;
use core_library::{EntityId, LibraryError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Remote service error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    /// No service holds a concrete link for the entity, so there is nothing
    /// to search with.
    #[error("Broken links: entity {entity_id} has no concrete link to resolve it on {service}")]
    BrokenLinks { entity_id: EntityId, service: String },

    #[error("Service not configured for linking: {0}")]
    UnknownService(String),
}

impl LinkError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LinkError::Bridge(BridgeError::Cancelled))
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;

use bridge_traits::BridgeError;
use core_library::LibraryError;
use core_link::LinkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Another sync is already in progress")]
    SyncInProgress,

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Sync timeout after {0} seconds")]
    Timeout(u64),

    #[error("Remote service error: {0}")]
    Remote(BridgeError),

    #[error("Link error: {0}")]
    Link(LinkError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Broken links: entity {entity_id} cannot be resolved on {service}")]
    BrokenLinks { entity_id: String, service: String },

    #[error("Snapshot failed: {0}")]
    Snapshot(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Cancellation and timeouts stop a sync without anything having failed,
    /// so they never trigger recovery.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            SyncError::Cancelled | SyncError::Timeout(_) | SyncError::Remote(BridgeError::Cancelled)
        )
    }
}

impl From<BridgeError> for SyncError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Cancelled => SyncError::Cancelled,
            other => SyncError::Remote(other),
        }
    }
}

impl From<LinkError> for SyncError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Bridge(e) => e.into(),
            LinkError::Library(e) => SyncError::Library(e),
            LinkError::BrokenLinks { entity_id, service } => SyncError::BrokenLinks {
                entity_id: entity_id.to_string(),
                service,
            },
            other => SyncError::Link(other),
        }
    }
}

impl From<core_runtime::Error> for SyncError {
    fn from(err: core_runtime::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

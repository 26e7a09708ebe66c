use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not authorized by {service}: {message}")]
    Unauthorized { service: String, message: String },

    #[error("Rate limited by {service}")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Not found on {service}: {id}")]
    NotFound { service: String, id: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure came from cancellation rather than the remote side.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BridgeError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

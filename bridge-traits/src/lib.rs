//! # Bridge Traits
//!
//! Contracts between the reconciliation core and everything it does not own.
//!
//! ## Overview
//!
//! The core links and reconciles a liked library across streaming services,
//! but it never talks to a service API itself. Each service ships adapters
//! implementing the capability traits in this crate, one per work kind:
//!
//! ### Streaming services
//! - [`Catalog`](catalog::Catalog) - search and fetch works of one kind
//! - [`LikedLibrary`](catalog::LikedLibrary) - liked collection of one kind
//! - [`PlaylistLibrary`](catalog::PlaylistLibrary) - owned playlists
//!
//! ### Host capabilities
//! - [`HttpClient`](http::HttpClient) - cover art downloads
//! - [`Clock`](time::Clock) - time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - forward structured logs to the host
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Adapters should
//! map throttling, auth failures and missing works onto the dedicated
//! variants so the core can tell them apart, and must return
//! [`BridgeError::Cancelled`] only for cancellation.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; adapters are shared behind `Arc`
//! across the tasks of a sync pass.
//!
//! ## Example
//!
//! ```ignore
//! use async_trait::async_trait;
//! use bridge_traits::catalog::LikedLibrary;
//! use bridge_traits::error::Result;
//! use bridge_traits::works::RemoteAlbum;
//!
//! struct DeezerAlbums { /* api client */ }
//!
//! #[async_trait]
//! impl LikedLibrary<RemoteAlbum> for DeezerAlbums {
//!     fn service_name(&self) -> &str { "deezer" }
//!     async fn liked(&self) -> Result<Vec<RemoteAlbum>> { /* paginate */ }
//!     async fn like(&self, ids: &[String]) -> Result<()> { /* batch */ }
//!     async fn unlike(&self, ids: &[String]) -> Result<()> { /* batch */ }
//! }
//! ```

pub mod cancel;
pub mod catalog;
pub mod error;
pub mod http;
pub mod time;
pub mod works;

pub use error::BridgeError;

// Re-export commonly used types
pub use cancel::{cancellable, CancellationToken};
pub use catalog::{Catalog, LikedLibrary, PlaylistLibrary};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
pub use works::{
    Discography, RemoteAlbum, RemoteArtist, RemotePlaylist, RemoteTrack, RemoteWork, WorkKind,
};

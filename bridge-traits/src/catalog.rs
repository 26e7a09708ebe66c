//! Streaming Service Capabilities
//!
//! Service adapters implement one trait per capability and per work kind, so
//! an adapter for a service without artist follows only implements the album
//! and track variants of [`LikedLibrary`].
//!
//! Adapters own authentication, pagination and rate limiting. Every method is
//! a suspension point and may be raced against a cancellation token by the
//! caller (see [`cancellable`](crate::cancel::cancellable)).

use async_trait::async_trait;

use crate::error::Result;
use crate::works::{RemotePlaylist, RemoteWork};

/// Read access to a service catalog for one work kind.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::catalog::Catalog;
/// use bridge_traits::works::RemoteAlbum;
///
/// async fn lookup(catalog: &dyn Catalog<RemoteAlbum>, query: &RemoteAlbum) {
///     let candidates = catalog.search(query).await?;
///     // ...
/// }
/// ```
#[async_trait]
pub trait Catalog<W: RemoteWork>: Send + Sync {
    /// Name of the service, matching [`RemoteWork::service`] of every work it returns.
    fn service_name(&self) -> &str;

    /// Search the catalog for candidates equivalent to `query`.
    ///
    /// `query` is usually a work observed on a different service. Adapters
    /// choose their own query strategy (name + artist, ISRC lookup, ...)
    /// and return candidates best-first.
    async fn search(&self, query: &W) -> Result<Vec<W>>;

    /// Fetch a work by its service-local id. `Ok(None)` when the catalog no
    /// longer has it.
    async fn fetch(&self, id: &str) -> Result<Option<W>>;

    /// Complete a work with data the matcher needs but listings omit.
    ///
    /// Artist adapters fill the discography fingerprint here. The default
    /// returns the work untouched.
    async fn enrich(&self, work: W) -> Result<W> {
        Ok(work)
    }
}

/// The account's liked collection for one work kind.
#[async_trait]
pub trait LikedLibrary<W: RemoteWork>: Send + Sync {
    fn service_name(&self) -> &str;

    /// Every work currently liked by the account.
    async fn liked(&self) -> Result<Vec<W>>;

    /// Like a batch of works by service-local id.
    async fn like(&self, ids: &[String]) -> Result<()>;

    /// Remove a batch of works from the liked collection.
    async fn unlike(&self, ids: &[String]) -> Result<()>;
}

/// Playlists owned by the account.
#[async_trait]
pub trait PlaylistLibrary: Send + Sync {
    fn service_name(&self) -> &str;

    async fn playlists(&self) -> Result<Vec<RemotePlaylist>>;

    /// Create a playlist and return it with its new service-local id.
    async fn create_playlist(
        &self,
        name: &str,
        description: Option<&str>,
        public: bool,
    ) -> Result<RemotePlaylist>;

    async fn delete_playlist(&self, id: &str) -> Result<()>;

    async fn rename_playlist(&self, id: &str, name: &str) -> Result<()>;

    async fn set_playlist_public(&self, id: &str, public: bool) -> Result<()>;
}

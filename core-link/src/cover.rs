//! Cover art fingerprinting
//!
//! Covers are compared by a 64-bit difference hash: the image is reduced to a
//! 9x8 grayscale grid and each bit records whether a pixel is brighter than
//! its right neighbour. Re-encoded or resized copies of the same artwork stay
//! within a few bits of each other.

use std::num::NonZeroUsize;
use std::sync::Arc;

use bridge_traits::{cancellable, CancellationToken, HttpClient, HttpRequest};
use image::imageops::FilterType;
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::matcher::{CoverSlot, Matchable};

/// Covers whose hashes differ in at most this many bits are the same artwork.
pub const MAX_HAMMING_DISTANCE: u32 = 10;

/// Whether two cover hashes denote the same artwork. Absent hashes never match.
pub fn covers_similar(a: Option<u64>, b: Option<u64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a ^ b).count_ones() <= MAX_HAMMING_DISTANCE,
        _ => false,
    }
}

/// Difference hash of an encoded image.
pub fn difference_hash(data: &[u8]) -> std::result::Result<u64, image::ImageError> {
    let img = image::load_from_memory(data)?;
    let grid = img.resize_exact(9, 8, FilterType::Triangle).to_luma8();

    let mut hash = 0u64;
    for y in 0..8 {
        for x in 0..8 {
            let left = grid.get_pixel(x, y)[0];
            let right = grid.get_pixel(x + 1, y)[0];
            hash = (hash << 1) | u64::from(left > right);
        }
    }
    Ok(hash)
}

/// Downloads and hashes covers, remembering results per URL.
pub struct CoverHasher {
    http: Option<Arc<dyn HttpClient>>,
    /// Failed downloads are cached as `None` so a broken URL is fetched once.
    cache: Mutex<LruCache<String, Option<u64>>>,
}

impl CoverHasher {
    pub fn new(http: Option<Arc<dyn HttpClient>>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            http,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Hasher that never downloads; cover evidence is simply absent.
    pub fn disabled() -> Self {
        Self::new(None, 1)
    }

    /// Hash the cover at `url`.
    ///
    /// Download and decode failures yield `Ok(None)`: a cover is optional
    /// evidence. Only cancellation is an error.
    pub async fn hash(&self, url: &str, cancel: &CancellationToken) -> Result<Option<u64>> {
        let Some(http) = &self.http else {
            return Ok(None);
        };

        if let Some(cached) = self.cache.lock().await.get(url) {
            return Ok(*cached);
        }

        let hash = match cancellable(cancel, http.execute(HttpRequest::get(url))).await {
            Ok(response) if response.is_success() => match difference_hash(&response.body) {
                Ok(hash) => Some(hash),
                Err(e) => {
                    debug!(url, error = %e, "Cover could not be decoded");
                    None
                }
            },
            Ok(response) => {
                debug!(url, status = response.status, "Cover download rejected");
                None
            }
            Err(e) if e.is_cancelled() => return Err(e.into()),
            Err(e) => {
                debug!(url, error = %e, "Cover download failed");
                None
            }
        };

        self.cache.lock().await.put(url.to_string(), hash);
        Ok(hash)
    }

    /// Fill every missing cover hash of `work`.
    pub async fn fill<W: Matchable>(&self, work: &mut W, cancel: &CancellationToken) -> Result<()> {
        if self.http.is_none() {
            return Ok(());
        }
        for CoverSlot { url, hash } in work.covers_mut() {
            if hash.is_none() {
                *hash = self.hash(url, cancel).await?;
            }
        }
        Ok(())
    }
}

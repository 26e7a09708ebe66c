//! Cross-service work matcher
//!
//! Scores how likely two works observed on different services are the same
//! work, and picks the best candidate from a service's search results.
//!
//! ## Scoring
//!
//! Each kind combines weighted evidence into a [`Similarity`]. A shared
//! global identifier (UPC/EAN for albums, ISRC for tracks) is an exact match
//! on its own. Without one, a candidate must reach [`MATCH_THRESHOLD`] to be
//! accepted, and a weight of at least [`EXACT_WEIGHT`] is promoted to exact.

use bridge_traits::RemoteWork;

mod album;
mod artist;
mod names;
mod playlist;
mod track;

pub use album::album_similarity;
pub use artist::artist_similarity;
pub use names::{artist_overlap, name_similarity, normalize};
pub use playlist::playlist_similarity;
pub use track::track_similarity;

/// Minimum weight for a non-exact candidate to be accepted.
pub const MATCH_THRESHOLD: f64 = 0.6;

/// Weights at or above this value count as exact.
pub const EXACT_WEIGHT: f64 = 0.99;

/// Result of comparing two works.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    /// Weight in `[0, 1]`.
    pub weight: f64,
    /// Certain match; short-circuits candidate selection.
    pub exact: bool,
}

impl Similarity {
    pub const NONE: Similarity = Similarity {
        weight: 0.0,
        exact: false,
    };

    pub const EXACT: Similarity = Similarity {
        weight: 1.0,
        exact: true,
    };

    /// Build from an accumulated weight, promoting near-certain weights to exact.
    pub fn from_weight(weight: f64) -> Self {
        if weight >= EXACT_WEIGHT {
            Self::EXACT
        } else {
            Self {
                weight: weight.clamp(0.0, 1.0),
                exact: false,
            }
        }
    }
}

/// Cover image of a work that still needs its perceptual hash.
pub struct CoverSlot<'a> {
    pub url: &'a str,
    pub hash: &'a mut Option<u64>,
}

/// A work kind the matcher knows how to compare.
pub trait Matchable: RemoteWork {
    fn similarity(&self, other: &Self) -> Similarity;

    /// Pick the candidate equivalent to `self`.
    ///
    /// An exact candidate wins immediately; otherwise the highest weight at
    /// or above [`MATCH_THRESHOLD`] wins, earlier candidates winning ties.
    fn select<'a>(&self, candidates: &'a [Self]) -> Option<&'a Self> {
        let mut best: Option<(&'a Self, f64)> = None;

        for candidate in candidates {
            let similarity = self.similarity(candidate);
            if similarity.exact {
                return Some(candidate);
            }
            if similarity.weight < MATCH_THRESHOLD {
                continue;
            }
            if best.map_or(true, |(_, weight)| similarity.weight > weight) {
                best = Some((candidate, similarity.weight));
            }
        }

        best.map(|(candidate, _)| candidate)
    }

    /// Covers the matcher compares, with room for their hashes.
    fn covers_mut(&mut self) -> Vec<CoverSlot<'_>> {
        Vec::new()
    }
}

/// Case-insensitive comparison of global identifiers (UPC, EAN, ISRC).
pub(crate) fn codes_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (a.map(str::trim), b.map(str::trim)) {
        (Some(a), Some(b)) if !a.is_empty() => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::RemoteAlbum;

    #[test]
    fn test_from_weight_promotes_near_certain() {
        assert!(Similarity::from_weight(0.995).exact);
        assert!(!Similarity::from_weight(0.98).exact);
        assert_eq!(Similarity::from_weight(0.5).weight, 0.5);
    }

    #[test]
    fn test_codes_match() {
        assert!(codes_match(Some("usrc17607839"), Some("USRC17607839")));
        assert!(!codes_match(Some(""), Some("")));
        assert!(!codes_match(None, Some("A")));
    }

    #[test]
    fn test_select_prefers_exact_then_highest_weight() {
        let query = RemoteAlbum::new("deezer", "d1", "Discovery")
            .with_artists(["Daft Punk"])
            .with_track_count(14);

        let weak = RemoteAlbum::new("tidal", "t1", "Homework").with_artists(["Daft Punk"]);
        let strong = RemoteAlbum::new("tidal", "t2", "Discovery")
            .with_artists(["Daft Punk"])
            .with_track_count(14);

        let candidates = vec![weak.clone(), strong.clone()];
        assert_eq!(query.select(&candidates).map(|a| a.id.as_str()), Some("t2"));

        let candidates = vec![weak];
        assert!(query.select(&candidates).is_none());
    }

    #[test]
    fn test_select_exact_short_circuits() {
        let query = RemoteAlbum::new("deezer", "d1", "Discovery").with_upc("724384960650");
        let by_upc = RemoteAlbum::new("tidal", "t9", "Discovery (Remastered)").with_upc("724384960650");
        let by_name = RemoteAlbum::new("tidal", "t1", "Discovery");

        let candidates = vec![by_name, by_upc];
        assert_eq!(query.select(&candidates).map(|a| a.id.as_str()), Some("t9"));
    }
}

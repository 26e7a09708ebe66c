use bridge_traits::RemoteAlbum;

use super::names::{artist_overlap, name_similarity};
use super::{codes_match, CoverSlot, Matchable, Similarity};
use crate::cover::covers_similar;

/// Weight by absolute track-count difference; a larger gap rejects.
const TRACK_COUNT_WEIGHTS: [f64; 5] = [0.10, 0.09, 0.08, 0.07, 0.06];
/// Weight by absolute release-year difference; a larger gap scores nothing.
const RELEASE_YEAR_WEIGHTS: [f64; 7] = [0.10, 0.09, 0.08, 0.07, 0.06, 0.05, 0.04];

const COVER_WEIGHT: f64 = 0.3;
const NAME_WEIGHT: f64 = 0.3;
const ARTISTS_WEIGHT: f64 = 0.2;

/// Compare two albums.
///
/// A shared UPC or EAN is exact. Otherwise each piece of evidence present on
/// both sides adds to the weight: track count, cover, name, artists and
/// release year. Track counts five or more apart reject the pair outright.
pub fn album_similarity(a: &RemoteAlbum, b: &RemoteAlbum) -> Similarity {
    if codes_match(a.upc.as_deref(), b.upc.as_deref())
        || codes_match(a.ean.as_deref(), b.ean.as_deref())
    {
        return Similarity::EXACT;
    }

    let mut weight = 0.0;

    if let (Some(x), Some(y)) = (a.track_count, b.track_count) {
        match TRACK_COUNT_WEIGHTS.get(x.abs_diff(y) as usize) {
            Some(w) => weight += w,
            None => return Similarity::NONE,
        }
    }

    if covers_similar(a.cover_hash, b.cover_hash) {
        weight += COVER_WEIGHT;
    }

    weight += name_similarity(&a.name, &b.name) * NAME_WEIGHT;

    if !a.artists.is_empty() && !b.artists.is_empty() {
        weight += artist_overlap(&a.artists, &b.artists) * ARTISTS_WEIGHT;
    }

    if let (Some(x), Some(y)) = (a.release_year, b.release_year) {
        if let Some(w) = RELEASE_YEAR_WEIGHTS.get(x.abs_diff(y) as usize) {
            weight += w;
        }
    }

    Similarity::from_weight(weight)
}

impl Matchable for RemoteAlbum {
    fn similarity(&self, other: &Self) -> Similarity {
        album_similarity(self, other)
    }

    fn covers_mut(&mut self) -> Vec<CoverSlot<'_>> {
        match self.cover_url.as_deref() {
            Some(url) => vec![CoverSlot {
                url,
                hash: &mut self.cover_hash,
            }],
            None => Vec::new(),
        }
    }
}

use bridge_traits::RemoteTrack;

use super::album::album_similarity;
use super::names::{artist_overlap, name_similarity};
use super::{codes_match, CoverSlot, Matchable, Similarity};
use crate::cover::covers_similar;

/// Durations further apart than this are different recordings.
const MAX_DURATION_GAP_MS: u64 = 1500;

const DURATION_WEIGHT: f64 = 0.2;
const COVER_WEIGHT: f64 = 0.2;
const NAME_WEIGHT: f64 = 0.2;
const ARTISTS_WEIGHT: f64 = 0.2;
const ALBUM_WEIGHT: f64 = 0.2;

/// Compare two tracks.
///
/// A shared ISRC is exact and durations more than 1.5 s apart reject the
/// pair. Artists and album count as full agreement when either side does not
/// report them, since many listings omit both.
pub fn track_similarity(a: &RemoteTrack, b: &RemoteTrack) -> Similarity {
    if codes_match(a.isrc.as_deref(), b.isrc.as_deref()) {
        return Similarity::EXACT;
    }

    let mut weight = 0.0;

    if let (Some(x), Some(y)) = (a.duration_ms, b.duration_ms) {
        if x.abs_diff(y) > MAX_DURATION_GAP_MS {
            return Similarity::NONE;
        }
        weight += DURATION_WEIGHT;
    }

    if covers_similar(cover_hash(a), cover_hash(b)) {
        weight += COVER_WEIGHT;
    }

    weight += name_similarity(&a.name, &b.name) * NAME_WEIGHT;

    weight += if a.artists.is_empty() || b.artists.is_empty() {
        ARTISTS_WEIGHT
    } else {
        artist_overlap(&a.artists, &b.artists) * ARTISTS_WEIGHT
    };

    weight += match (&a.album, &b.album) {
        (Some(x), Some(y)) => album_similarity(x, y).weight * ALBUM_WEIGHT,
        _ => ALBUM_WEIGHT,
    };

    Similarity::from_weight(weight)
}

/// The track's own cover, falling back to its album's.
fn cover_hash(track: &RemoteTrack) -> Option<u64> {
    track
        .cover_hash
        .or_else(|| track.album.as_ref().and_then(|album| album.cover_hash))
}

impl Matchable for RemoteTrack {
    fn similarity(&self, other: &Self) -> Similarity {
        track_similarity(self, other)
    }

    fn covers_mut(&mut self) -> Vec<CoverSlot<'_>> {
        let mut slots = Vec::new();
        if let Some(url) = self.cover_url.as_deref() {
            slots.push(CoverSlot {
                url,
                hash: &mut self.cover_hash,
            });
        }
        if let Some(album) = self.album.as_mut() {
            slots.extend(album.covers_mut());
        }
        slots
    }
}

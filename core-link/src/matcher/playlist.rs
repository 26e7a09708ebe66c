use bridge_traits::RemotePlaylist;

use super::names::normalize;
use super::{Matchable, Similarity};

/// Playlists only match under the same normalized name.
pub fn playlist_similarity(a: &RemotePlaylist, b: &RemotePlaylist) -> Similarity {
    let a = normalize(&a.name);
    if !a.is_empty() && a == normalize(&b.name) {
        Similarity::EXACT
    } else {
        Similarity::NONE
    }
}

impl Matchable for RemotePlaylist {
    fn similarity(&self, other: &Self) -> Similarity {
        playlist_similarity(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_normalized_name() {
        let a = RemotePlaylist::new("deezer", "1", "Road Trip!");
        let b = RemotePlaylist::new("tidal", "2", "road trip");
        let c = RemotePlaylist::new("tidal", "3", "Road Trip 2");

        assert!(playlist_similarity(&a, &b).exact);
        assert_eq!(playlist_similarity(&a, &c), Similarity::NONE);
    }
}

use bridge_traits::{Discography, RemoteArtist};
use tracing::warn;

use super::names::name_similarity;
use super::{Matchable, Similarity};

/// How many of the oldest releases of each category are compared.
const DISCOGRAPHY_DEPTH: usize = 5;

/// Compare two artists by their discographies.
///
/// Artist names are too ambiguous to match on, so the weight is the average
/// overlap of the oldest albums and the oldest singles. A category only
/// counts when both artists have releases in it.
pub fn artist_similarity(a: &RemoteArtist, b: &RemoteArtist) -> Similarity {
    let (Some(a), Some(b)) = (&a.discography, &b.discography) else {
        return Similarity::NONE;
    };

    let overlaps: Vec<f64> = [
        release_overlap(&a.albums, &b.albums),
        release_overlap(&a.singles, &b.singles),
    ]
    .into_iter()
    .flatten()
    .collect();

    if overlaps.is_empty() {
        return Similarity::NONE;
    }

    Similarity::from_weight(overlaps.iter().sum::<f64>() / overlaps.len() as f64)
}

fn release_overlap(a: &[String], b: &[String]) -> Option<f64> {
    let a = &a[..a.len().min(DISCOGRAPHY_DEPTH)];
    let b = &b[..b.len().min(DISCOGRAPHY_DEPTH)];
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let shared = a
        .iter()
        .filter(|x| b.iter().any(|y| name_similarity(x, y) > 0.0))
        .count();
    Some(shared as f64 / a.len().max(b.len()) as f64)
}

impl Matchable for RemoteArtist {
    fn similarity(&self, other: &Self) -> Similarity {
        artist_similarity(self, other)
    }

    /// The best non-zero discography overlap wins. When no candidate shares
    /// any release, the top search result is accepted only under the exact
    /// same name.
    fn select<'a>(&self, candidates: &'a [Self]) -> Option<&'a Self> {
        let mut best: Option<(&'a Self, f64)> = None;
        for candidate in candidates {
            let weight = self.similarity(candidate).weight;
            if weight > 0.0 && best.map_or(true, |(_, w)| weight > w) {
                best = Some((candidate, weight));
            }
        }
        if let Some((candidate, _)) = best {
            return Some(candidate);
        }

        let top = candidates.first()?;
        if top.name.trim().to_lowercase() == self.name.trim().to_lowercase() {
            warn!(
                artist = %self.name,
                service = %top.service,
                remote_id = %top.id,
                "No discography overlap; linking artist by name only"
            );
            return Some(top);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discography(albums: &[&str], singles: &[&str]) -> Discography {
        Discography {
            albums: albums.iter().map(|s| s.to_string()).collect(),
            singles: singles.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn artist(service: &str, id: &str, name: &str, d: Discography) -> RemoteArtist {
        RemoteArtist::new(service, id, name).with_discography(d)
    }

    #[test]
    fn test_overlap_of_both_categories_is_averaged() {
        let a = artist(
            "deezer",
            "1",
            "Air",
            discography(&["Moon Safari", "The Virgin Suicides"], &["Sexy Boy"]),
        );
        let b = artist(
            "tidal",
            "2",
            "Air",
            discography(&["Moon Safari (Deluxe Edition)", "Talkie Walkie"], &["Kelly Watch the Stars"]),
        );

        // albums 1/2, singles 0/1
        assert!((artist_similarity(&a, &b).weight - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_only_oldest_releases_compared() {
        let old: Vec<String> = (1..=5).map(|n| format!("Record {n}")).collect();
        let mut a_albums: Vec<&str> = old.iter().map(String::as_str).collect();
        a_albums.push("Shared Late Album");
        let a = artist("deezer", "1", "X", discography(&a_albums, &[]));
        let b = artist("tidal", "2", "X", discography(&["Shared Late Album"], &[]));

        assert_eq!(artist_similarity(&a, &b), Similarity::NONE);
    }

    #[test]
    fn test_category_missing_on_one_side_is_ignored() {
        let a = artist("deezer", "1", "Air", discography(&["Moon Safari"], &["Sexy Boy"]));
        let b = artist("tidal", "2", "Air", discography(&["Moon Safari"], &[]));
        assert!(artist_similarity(&a, &b).exact);
    }

    #[test]
    fn test_select_falls_back_to_exact_name() {
        let query = artist("deezer", "1", "Air", discography(&["Moon Safari"], &[]));
        let top = artist("tidal", "9", "air", discography(&["Unrelated"], &[]));
        let other = artist("tidal", "8", "Air Supply", discography(&["Lost in Love"], &[]));

        let candidates = vec![top.clone(), other.clone()];
        assert_eq!(query.select(&candidates).map(|a| a.id.as_str()), Some("9"));

        let candidates = vec![other];
        assert!(query.select(&candidates).is_none());
    }

    #[test]
    fn test_select_prefers_overlap_over_name() {
        let query = artist("deezer", "1", "Air", discography(&["Moon Safari", "Premiers Symptomes"], &[]));
        let namesake = artist("tidal", "9", "Air", discography(&["Unrelated"], &[]));
        let real = artist("tidal", "7", "AIR (French band)", discography(&["Moon Safari"], &[]));

        let candidates = vec![namesake, real];
        assert_eq!(query.select(&candidates).map(|a| a.id.as_str()), Some("7"));
    }
}

//! Policy for a match that disagrees with a stored link.

use core_library::Linked;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelinkDecision {
    /// Point the link at the freshly matched remote id.
    Overwrite,
    /// Keep the stored remote id.
    Keep,
}

/// Decides what happens when a work matches a different remote id than the
/// one an entity is already linked to on that service.
pub trait RelinkPolicy: Send + Sync {
    fn resolve(&self, existing: &Linked, matched_remote_id: &str) -> RelinkDecision;
}

/// The most recent observation replaces the stored link.
#[derive(Debug, Default, Clone, Copy)]
pub struct LastObservedWins;

impl RelinkPolicy for LastObservedWins {
    fn resolve(&self, _existing: &Linked, _matched_remote_id: &str) -> RelinkDecision {
        RelinkDecision::Overwrite
    }
}

/// A stored concrete link is never replaced; missing links still resolve.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepExisting;

impl RelinkPolicy for KeepExisting {
    fn resolve(&self, existing: &Linked, _matched_remote_id: &str) -> RelinkDecision {
        if existing.is_missing() {
            RelinkDecision::Overwrite
        } else {
            RelinkDecision::Keep
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::EntityId;

    fn link(remote_id: Option<&str>) -> Linked {
        Linked {
            entity_id: EntityId::new(),
            service: "tidal".to_string(),
            remote_id: remote_id.map(str::to_string),
            modified_at: 0,
        }
    }

    #[test]
    fn test_policies() {
        assert_eq!(LastObservedWins.resolve(&link(Some("a")), "b"), RelinkDecision::Overwrite);
        assert_eq!(KeepExisting.resolve(&link(Some("a")), "b"), RelinkDecision::Keep);
        assert_eq!(KeepExisting.resolve(&link(None), "b"), RelinkDecision::Overwrite);
    }
}

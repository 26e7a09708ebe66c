//! Accounts and the attribute classes they sync.

use std::fmt;
use std::sync::Arc;

use bridge_traits::{
    Catalog, LikedLibrary, PlaylistLibrary, RemoteAlbum, RemoteArtist, RemoteTrack, RemoteWork,
    WorkKind,
};

use crate::error::{Result, SyncError};

/// Independent slice of the library with its own entity space and its own
/// last-sync watermark per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeClass {
    Albums,
    Artists,
    Tracks,
    Playlists,
}

impl AttributeClass {
    pub const ALL: [AttributeClass; 4] = [
        AttributeClass::Albums,
        AttributeClass::Artists,
        AttributeClass::Tracks,
        AttributeClass::Playlists,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeClass::Albums => "albums",
            AttributeClass::Artists => "artists",
            AttributeClass::Tracks => "tracks",
            AttributeClass::Playlists => "playlists",
        }
    }

    pub fn kind(&self) -> WorkKind {
        match self {
            AttributeClass::Albums => WorkKind::Album,
            AttributeClass::Artists => WorkKind::Artist,
            AttributeClass::Tracks => WorkKind::Track,
            AttributeClass::Playlists => WorkKind::Playlist,
        }
    }

    pub fn of(kind: WorkKind) -> Self {
        match kind {
            WorkKind::Album => AttributeClass::Albums,
            WorkKind::Artist => AttributeClass::Artists,
            WorkKind::Track => AttributeClass::Tracks,
            WorkKind::Playlist => AttributeClass::Playlists,
        }
    }
}

impl fmt::Display for AttributeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog and liked collection of one work kind on one service.
pub struct Likeable<W: RemoteWork> {
    pub catalog: Arc<dyn Catalog<W>>,
    pub library: Arc<dyn LikedLibrary<W>>,
}

impl<W: RemoteWork> Clone for Likeable<W> {
    fn clone(&self) -> Self {
        Self {
            catalog: self.catalog.clone(),
            library: self.library.clone(),
        }
    }
}

/// One user account on one streaming service.
///
/// Only the capabilities the service supports are set; an account without
/// artists simply never takes part in artist syncing.
#[derive(Clone)]
pub struct Account {
    name: String,
    service: String,
    pub(crate) albums: Option<Likeable<RemoteAlbum>>,
    pub(crate) artists: Option<Likeable<RemoteArtist>>,
    pub(crate) tracks: Option<Likeable<RemoteTrack>>,
    pub(crate) playlists: Option<Arc<dyn PlaylistLibrary>>,
}

impl Account {
    pub fn new(name: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service: service.into(),
            albums: None,
            artists: None,
            tracks: None,
            playlists: None,
        }
    }

    pub fn with_albums(
        mut self,
        catalog: Arc<dyn Catalog<RemoteAlbum>>,
        library: Arc<dyn LikedLibrary<RemoteAlbum>>,
    ) -> Self {
        self.albums = Some(Likeable { catalog, library });
        self
    }

    pub fn with_artists(
        mut self,
        catalog: Arc<dyn Catalog<RemoteArtist>>,
        library: Arc<dyn LikedLibrary<RemoteArtist>>,
    ) -> Self {
        self.artists = Some(Likeable { catalog, library });
        self
    }

    pub fn with_tracks(
        mut self,
        catalog: Arc<dyn Catalog<RemoteTrack>>,
        library: Arc<dyn LikedLibrary<RemoteTrack>>,
    ) -> Self {
        self.tracks = Some(Likeable { catalog, library });
        self
    }

    pub fn with_playlists(mut self, library: Arc<dyn PlaylistLibrary>) -> Self {
        self.playlists = Some(library);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn supports(&self, class: AttributeClass) -> bool {
        match class {
            AttributeClass::Albums => self.albums.is_some(),
            AttributeClass::Artists => self.artists.is_some(),
            AttributeClass::Tracks => self.tracks.is_some(),
            AttributeClass::Playlists => self.playlists.is_some(),
        }
    }

    /// Every adapter must report the account's service name.
    pub fn validate(&self) -> Result<()> {
        let mut reported: Vec<&str> = Vec::new();
        if let Some(l) = &self.albums {
            reported.extend([l.catalog.service_name(), l.library.service_name()]);
        }
        if let Some(l) = &self.artists {
            reported.extend([l.catalog.service_name(), l.library.service_name()]);
        }
        if let Some(l) = &self.tracks {
            reported.extend([l.catalog.service_name(), l.library.service_name()]);
        }
        if let Some(p) = &self.playlists {
            reported.push(p.service_name());
        }

        match reported.into_iter().find(|name| *name != self.service) {
            Some(other) => Err(SyncError::Config(format!(
                "account '{}' is on service '{}' but an adapter reports '{}'",
                self.name, self.service, other
            ))),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let classes: Vec<&str> = AttributeClass::ALL
            .iter()
            .filter(|c| self.supports(**c))
            .map(|c| c.as_str())
            .collect();
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("service", &self.service)
            .field("classes", &classes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_class_round_trip() {
        for class in AttributeClass::ALL {
            assert_eq!(AttributeClass::of(class.kind()), class);
        }
        assert_eq!(AttributeClass::Playlists.to_string(), "playlists");
    }

    #[test]
    fn test_account_without_capabilities() {
        let account = Account::new("me@deezer", "deezer");
        assert!(!account.supports(AttributeClass::Albums));
        assert!(account.validate().is_ok());
        assert!(format!("{:?}", account).contains("me@deezer"));
    }
}

//! Remote Works
//!
//! Live representations of albums, artists, tracks and playlists as a
//! streaming service reports them. The core never owns these values: they are
//! observed during a sync pass, matched against each other and then dropped.
//!
//! Every work carries the name of the service it was read from together with
//! the service-local identifier, so a work can always be traced back to the
//! replica it describes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;

/// Kind of work a canonical entity or a remote value describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkKind {
    Album,
    Artist,
    Track,
    Playlist,
}

impl WorkKind {
    pub const ALL: [WorkKind; 4] = [
        WorkKind::Album,
        WorkKind::Artist,
        WorkKind::Track,
        WorkKind::Playlist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkKind::Album => "album",
            WorkKind::Artist => "artist",
            WorkKind::Track => "track",
            WorkKind::Playlist => "playlist",
        }
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "album" => Ok(WorkKind::Album),
            "artist" => Ok(WorkKind::Artist),
            "track" => Ok(WorkKind::Track),
            "playlist" => Ok(WorkKind::Playlist),
            other => Err(BridgeError::OperationFailed(format!(
                "unknown work kind: {}",
                other
            ))),
        }
    }
}

/// Common surface of every remote work.
pub trait RemoteWork: Clone + fmt::Debug + Send + Sync + 'static {
    /// Kind of canonical entity this work resolves to.
    const KIND: WorkKind;

    /// Service-local identifier.
    fn id(&self) -> &str;

    /// Name of the service this work was observed on.
    fn service(&self) -> &str;

    /// Display name (title for albums/tracks/playlists, artist name).
    fn name(&self) -> &str;
}

/// Album as reported by a streaming service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteAlbum {
    pub service: String,
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub upc: Option<String>,
    pub ean: Option<String>,
    pub track_count: Option<u32>,
    pub release_year: Option<i32>,
    pub cover_url: Option<String>,
    /// Perceptual fingerprint of the cover, filled in before matching.
    #[serde(skip)]
    pub cover_hash: Option<u64>,
}

impl RemoteAlbum {
    pub fn new(
        service: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_artists<I, S>(mut self, artists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artists = artists.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_upc(mut self, upc: impl Into<String>) -> Self {
        self.upc = Some(upc.into());
        self
    }

    pub fn with_ean(mut self, ean: impl Into<String>) -> Self {
        self.ean = Some(ean.into());
        self
    }

    pub fn with_track_count(mut self, count: u32) -> Self {
        self.track_count = Some(count);
        self
    }

    pub fn with_release_year(mut self, year: i32) -> Self {
        self.release_year = Some(year);
        self
    }

    pub fn with_cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }
}

impl RemoteWork for RemoteAlbum {
    const KIND: WorkKind = WorkKind::Album;

    fn id(&self) -> &str {
        &self.id
    }

    fn service(&self) -> &str {
        &self.service
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Track as reported by a streaming service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteTrack {
    pub service: String,
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub isrc: Option<String>,
    pub duration_ms: Option<u64>,
    pub cover_url: Option<String>,
    #[serde(skip)]
    pub cover_hash: Option<u64>,
    pub album: Option<RemoteAlbum>,
}

impl RemoteTrack {
    pub fn new(
        service: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_artists<I, S>(mut self, artists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artists = artists.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_isrc(mut self, isrc: impl Into<String>) -> Self {
        self.isrc = Some(isrc.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }

    pub fn with_album(mut self, album: RemoteAlbum) -> Self {
        self.album = Some(album);
        self
    }
}

impl RemoteWork for RemoteTrack {
    const KIND: WorkKind = WorkKind::Track;

    fn id(&self) -> &str {
        &self.id
    }

    fn service(&self) -> &str {
        &self.service
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Discography fingerprint of an artist: release names, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Discography {
    pub albums: Vec<String>,
    pub singles: Vec<String>,
}

/// Artist as reported by a streaming service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteArtist {
    pub service: String,
    pub id: String,
    pub name: String,
    /// Filled by [`Catalog::enrich`](crate::catalog::Catalog::enrich).
    pub discography: Option<Discography>,
}

impl RemoteArtist {
    pub fn new(
        service: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            id: id.into(),
            name: name.into(),
            discography: None,
        }
    }

    pub fn with_discography(mut self, discography: Discography) -> Self {
        self.discography = Some(discography);
        self
    }
}

impl RemoteWork for RemoteArtist {
    const KIND: WorkKind = WorkKind::Artist;

    fn id(&self) -> &str {
        &self.id
    }

    fn service(&self) -> &str {
        &self.service
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Playlist owned by the account on a streaming service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemotePlaylist {
    pub service: String,
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub public: bool,
}

impl RemotePlaylist {
    pub fn new(
        service: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            id: id.into(),
            name: name.into(),
            description: None,
            public: false,
        }
    }

    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }
}

impl RemoteWork for RemotePlaylist {
    const KIND: WorkKind = WorkKind::Playlist;

    fn id(&self) -> &str {
        &self.id
    }

    fn service(&self) -> &str {
        &self.service
    }

    fn name(&self) -> &str {
        &self.name
    }
}

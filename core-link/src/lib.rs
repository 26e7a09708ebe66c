//! # Core Link
//!
//! Cross-service identity for the liked library.
//!
//! ## Overview
//!
//! The same album has a different id on every streaming service. This crate
//! decides which remote works are the same work and records that as links
//! from a canonical entity to each service:
//!
//! - [`matcher`] - weighted similarity per work kind and candidate selection
//! - [`cover`] - perceptual cover hashes used as matching evidence
//! - [`LinkedService`] - a service catalog plus its links
//! - [`Linker`] - inbound (`from_remote`) and outbound (`to_remote`) linking
//!
//! ## Example
//!
//! ```ignore
//! let linker = Linker::new(entities, vec![deezer, tidal], &settings);
//! let linked = linker.from_remote(&observed_album, &cancel).await?;
//! let on_tidal = linker.to_remote(&linked.entity_id, "tidal", &cancel).await?;
//! ```

pub mod cover;
pub mod error;
pub mod linker;
pub mod matcher;
pub mod relink;
pub mod service;

pub use cover::CoverHasher;
pub use error::{LinkError, Result};
pub use linker::{Linker, ToRemoteResult};
pub use matcher::{Matchable, Similarity};
pub use relink::{KeepExisting, LastObservedWins, RelinkDecision, RelinkPolicy};
pub use service::LinkedService;

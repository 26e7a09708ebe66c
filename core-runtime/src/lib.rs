//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the linker and the sync engine:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! Nothing here knows about entities or links; it only establishes the
//! conventions the other crates rely on.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, SyncSettings};
pub use error::{Error, Result};

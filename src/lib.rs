//! Workspace facade crate.
//!
//! Re-exports the workspace crates so a host application can depend on
//! `tunesync-workspace` alone. The `desktop-shims` feature (on by default)
//! wires the reqwest-backed HTTP client used for cover downloads.

pub use bridge_traits as bridge;
pub use core_library as library;
pub use core_link as link;
pub use core_runtime as runtime;
pub use core_sync as sync;

pub use core_runtime::{CoreConfig, SyncSettings};
pub use core_sync::{Account, SyncCoordinator, SyncError, SyncReport};

//! # Core Configuration Module
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! [`CoreConfig`] holding the host capabilities and the reconciliation
//! settings. Validation is fail-fast: a misconfigured core refuses to start
//! instead of running a sync pass with surprising behavior.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, SyncSettings};
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/library.db")
//!     .sync_settings(
//!         SyncSettings::default()
//!             .with_auto_recover(true)
//!             .with_max_convergence_passes(3),
//!     )
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! When the `desktop-shims` feature is enabled and no [`HttpClient`] is
//! injected, the reqwest-backed client from `bridge-desktop` is used for cover
//! downloads. Without it, cover similarity is simply never awarded.

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use bridge_traits::{Clock, HttpClient, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;

/// Reconciliation settings shared by the linker and the sync coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Re-search services for links previously marked missing.
    ///
    /// When false a missing link acts as a negative cache and no search is
    /// issued for it.
    pub recheck_missing: bool,

    /// Reverse the remote mutations of a pass that failed on a remote error.
    pub auto_recover: bool,

    /// Automatic snapshots kept before a sync mutates anything. 0 disables
    /// automatic snapshots.
    pub max_auto_snapshots: u32,

    /// Upper bound of link-and-reconcile passes per sync. The loop stops
    /// earlier once a pass changes nothing.
    pub max_convergence_passes: u32,

    /// Timeout for a single pass, in seconds. A pass that runs over is
    /// cancelled and the sync fails as timed out.
    pub pass_timeout_secs: u64,

    /// Cover fingerprints kept in memory.
    pub cover_cache_capacity: usize,

    /// Enriched works (e.g. artist discographies) kept in memory per service.
    pub enrich_cache_capacity: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            recheck_missing: true,
            auto_recover: true,
            max_auto_snapshots: 5,
            max_convergence_passes: 2,
            pass_timeout_secs: 3600,
            cover_cache_capacity: 512,
            enrich_cache_capacity: 256,
        }
    }
}

impl SyncSettings {
    pub fn with_recheck_missing(mut self, recheck: bool) -> Self {
        self.recheck_missing = recheck;
        self
    }

    pub fn with_auto_recover(mut self, auto_recover: bool) -> Self {
        self.auto_recover = auto_recover;
        self
    }

    pub fn with_max_auto_snapshots(mut self, max: u32) -> Self {
        self.max_auto_snapshots = max;
        self
    }

    pub fn with_max_convergence_passes(mut self, passes: u32) -> Self {
        self.max_convergence_passes = passes;
        self
    }

    pub fn with_pass_timeout_secs(mut self, secs: u64) -> Self {
        self.pass_timeout_secs = secs;
        self
    }

    pub fn with_cover_cache_capacity(mut self, capacity: usize) -> Self {
        self.cover_cache_capacity = capacity;
        self
    }

    pub fn with_enrich_cache_capacity(mut self, capacity: usize) -> Self {
        self.enrich_cache_capacity = capacity;
        self
    }

    /// Validates the settings
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.max_convergence_passes == 0 {
            return Err(Error::Config(
                "max_convergence_passes must be at least 1".to_string(),
            ));
        }

        if self.max_convergence_passes > 10 {
            return Err(Error::Config(
                "max_convergence_passes exceeds maximum of 10; a sync that does not \
                 settle within 10 passes indicates a relinking cycle"
                    .to_string(),
            ));
        }

        if self.pass_timeout_secs == 0 {
            return Err(Error::Config(
                "pass_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.cover_cache_capacity == 0 || self.enrich_cache_capacity == 0 {
            return Err(Error::Config(
                "cache capacities must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Core configuration.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// HTTP client used to download cover art
    pub http_client: Option<Arc<dyn HttpClient>>,

    /// Time source for every persisted timestamp
    pub clock: Arc<dyn Clock>,

    pub sync: SyncSettings,

    /// Passed to [`crate::logging::init_logging`] by the host
    pub logging: LoggingConfig,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field("sync", &self.sync)
            .field("logging", &self.logging)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        self.sync.validate()
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new().map_err(|e| Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: format!("default reqwest client could not be created: {}", e),
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(Some(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    Ok(None)
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    sync: Option<SyncSettings>,
    logging: Option<LoggingConfig>,
}

impl CoreConfigBuilder {
    /// Sets the database path.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Overrides the system clock, mostly for tests.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn sync_settings(mut self, settings: SyncSettings) -> Self {
        self.sync = Some(settings);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the database path is missing or a setting is out of range
    /// - [`Error::CapabilityMissing`] when the default HTTP client cannot be created
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config(
                "database_path is required. Call .database_path(\"/path/to/library.db\")"
                    .to_string(),
            )
        })?;

        let http_client = match self.http_client {
            Some(client) => Some(client),
            None => provide_default_http_client()?,
        };

        let config = CoreConfig {
            database_path,
            http_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            sync: self.sync.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::ManualClock;

    #[test]
    fn test_sync_settings_defaults() {
        let settings = SyncSettings::default();
        assert!(settings.recheck_missing);
        assert!(settings.auto_recover);
        assert_eq!(settings.max_auto_snapshots, 5);
        assert_eq!(settings.max_convergence_passes, 2);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_passes_rejected() {
        let settings = SyncSettings::default().with_max_convergence_passes(0);
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("at least 1")));
    }

    #[test]
    fn test_runaway_passes_rejected() {
        let settings = SyncSettings::default().with_max_convergence_passes(11);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_cache_rejected() {
        let settings = SyncSettings::default().with_cover_cache_capacity(0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_builder_requires_database_path() {
        let result = CoreConfig::builder().build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("database_path")));
    }

    #[test]
    fn test_builder_with_overrides() {
        let config = CoreConfig::builder()
            .database_path("/tmp/library.db")
            .clock(Arc::new(ManualClock::new(42)))
            .sync_settings(SyncSettings::default().with_recheck_missing(false))
            .build()
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/library.db"));
        assert_eq!(config.clock.unix_timestamp_millis(), 42);
        assert!(!config.sync.recheck_missing);
        assert!(config.logging.filter.is_none());
    }

    #[test]
    fn test_builder_keeps_logging_config() {
        let config = CoreConfig::builder()
            .database_path("/tmp/library.db")
            .logging(LoggingConfig::default().with_filter("core_sync=trace"))
            .build()
            .unwrap();

        assert_eq!(config.logging.filter.as_deref(), Some("core_sync=trace"));
    }

    #[test]
    fn test_builder_validates_sync_settings() {
        let result = CoreConfig::builder()
            .database_path("/tmp/library.db")
            .sync_settings(SyncSettings::default().with_pass_timeout_secs(0))
            .build();
        assert!(result.is_err());
    }
}

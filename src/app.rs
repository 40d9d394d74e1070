//! Application state.
//!
//! The `App` struct holds everything a request needs: configuration, the
//! store, the AI analyzer and the file storage backend. It is built once at
//! startup and shared behind an `Arc`.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;

use crate::ai::{AIGateway, Analyzer};
use crate::core::Config;
use crate::store::Store;
use crate::upload::{self, FileStorage};

/// Shared application state.
pub struct App {
    /// Application configuration
    pub config: Config,

    /// Persistent records
    pub store: Store,

    /// AI analyses over the provider chain
    pub analyzer: Analyzer,

    /// Evidence file storage
    pub files: Arc<dyn FileStorage>,
}

impl App {
    /// Assemble an app from already-built parts.
    pub fn new(
        config: Config,
        store: Store,
        analyzer: Analyzer,
        files: Arc<dyn FileStorage>,
    ) -> Self {
        Self { config, store, analyzer, files }
    }

    /// Build the app from configuration: open the database, set up the AI
    /// providers and the storage backend.
    ///
    /// Fails when no AI provider has an API key.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let store = Store::open(&config.database.path).with_context(|| {
            format!("Failed to open database at {}", config.database.path.display())
        })?;

        let gateway =
            AIGateway::from_config(&config.ai).context("Failed to configure AI providers")?;
        tracing::info!(providers = ?gateway.provider_names(), "AI providers configured");

        let files =
            upload::from_config(&config.storage).context("Failed to configure file storage")?;
        tracing::info!(backend = files.name(), "File storage configured");

        Ok(Self::new(config, store, Analyzer::new(Arc::new(gateway)), files))
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("store", &self.store)
            .field("analyzer", &self.analyzer)
            .field("files", &self.files.name())
            .finish_non_exhaustive()
    }
}

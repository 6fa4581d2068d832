//! Application state shared across handlers.

use std::sync::Arc;

use pagesnap_core::{Directory, SnapshotStore};

use crate::config::SnapshotConfig;
use crate::service::SnapshotService;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: SnapshotConfig,
    service: SnapshotService,
    http: reqwest::Client,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin HTTP client cannot be built.
    pub fn new(
        config: SnapshotConfig,
        directory: Arc<dyn Directory>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self, StateError> {
        let service = SnapshotService::from_config(&config, directory, store);
        let http = reqwest::Client::builder()
            .timeout(config.origin_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                service,
                http,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SnapshotConfig {
        &self.inner.config
    }

    /// Resolver, generator and cache.
    #[must_use]
    pub fn service(&self) -> &SnapshotService {
        &self.inner.service
    }

    /// Client used to fail open to the origin.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }
}

//! Application state shared across handlers.

use std::sync::Arc;

use pagesnap_core::{Directory, Resolver};

use crate::config::OriginConfig;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: OriginConfig,
    resolver: Resolver,
}

impl AppState {
    #[must_use]
    pub fn new(config: OriginConfig, directory: Arc<dyn Directory>) -> Self {
        let resolver = Resolver::new(directory, config.system_domains.clone());
        Self {
            inner: Arc::new(AppStateInner { config, resolver }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &OriginConfig {
        &self.inner.config
    }

    /// The same resolver every other tier links.
    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }
}

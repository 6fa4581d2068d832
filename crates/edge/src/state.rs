//! Application state shared across handlers.

use std::sync::Arc;

use pagesnap_core::{Directory, SystemDomains};

use crate::config::EdgeConfig;
use crate::domains::DomainCheck;
use crate::proxy::Proxy;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: EdgeConfig,
    proxy: Proxy,
    domains: DomainCheck,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream HTTP client cannot be built.
    pub fn new(config: EdgeConfig, directory: Arc<dyn Directory>) -> Result<Self, reqwest::Error> {
        let proxy = Proxy::new(&config)?;
        let domains = DomainCheck::new(directory, config.domain_cache_ttl);
        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                proxy,
                domains,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &EdgeConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn system_domains(&self) -> &SystemDomains {
        &self.inner.config.system_domains
    }

    #[must_use]
    pub fn proxy(&self) -> &Proxy {
        &self.inner.proxy
    }

    #[must_use]
    pub fn domains(&self) -> &DomainCheck {
        &self.inner.domains
    }
}

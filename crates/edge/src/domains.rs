//! Cached domain-ownership checks.
//!
//! Every request to a custom domain needs to know whether the domain is
//! DNS-verified. Answers are cached in-process for a short TTL; directory
//! failures are not cached and count as "not verified", which sends the
//! request to the origin.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use pagesnap_core::{Directory, Hostname, find_verified_domain};
use tracing::warn;

const MAX_CACHED_DOMAINS: u64 = 10_000;

#[derive(Clone)]
pub struct DomainCheck {
    directory: Arc<dyn Directory>,
    cache: Cache<Hostname, bool>,
}

impl DomainCheck {
    #[must_use]
    pub fn new(directory: Arc<dyn Directory>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_CACHED_DOMAINS)
            .time_to_live(ttl)
            .build();
        Self { directory, cache }
    }

    /// Whether `host` (or its `www.` twin) is a verified custom domain.
    pub async fn is_verified(&self, host: &Hostname) -> bool {
        let directory = Arc::clone(&self.directory);
        let lookup = host.clone();
        let result = self
            .cache
            .try_get_with(host.clone(), async move {
                find_verified_domain(directory.as_ref(), &lookup)
                    .await
                    .map(|domain| domain.is_some())
            })
            .await;

        result.unwrap_or_else(|e| {
            warn!(error = %e, host = %host, "Domain check failed, treating as unverified");
            false
        })
    }

    /// The directory behind the check.
    #[must_use]
    pub fn directory(&self) -> &dyn Directory {
        self.directory.as_ref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pagesnap_core::memory::Fixture;

    use super::*;

    fn check(fx: &Fixture) -> DomainCheck {
        DomainCheck::new(Arc::new(fx.directory.clone()), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_verified_and_www_variant() {
        let fx = Fixture::shop();
        let check = check(&fx);
        assert!(check.is_verified(&Hostname::parse("shop.example.com").unwrap()).await);
        assert!(check.is_verified(&Hostname::parse("www.shop.example.com").unwrap()).await);
    }

    #[tokio::test]
    async fn test_unverified_and_unknown() {
        let fx = Fixture::shop();
        let check = check(&fx);
        assert!(!check.is_verified(&Hostname::parse("pending.example.com").unwrap()).await);
        assert!(!check.is_verified(&Hostname::parse("nobody.example.net").unwrap()).await);
    }

    #[tokio::test]
    async fn test_answers_are_cached_for_ttl() {
        let fx = Fixture::shop();
        let check = check(&fx);
        let late = Hostname::parse("late.example.com").unwrap();
        assert!(!check.is_verified(&late).await);

        let id = fx.directory.add_domain(fx.store, late.clone(), false);
        fx.directory.set_domain_verified(id, true);
        assert!(!check.is_verified(&late).await);
    }
}

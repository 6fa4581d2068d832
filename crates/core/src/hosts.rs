//! The platform's own hostnames.
//!
//! Matching is exact against a single allow-list. A tenant domain such as
//! `notpagesnap.app` or `pagesnap.app.evil.com` must never be mistaken for a
//! system domain, which substring checks get wrong.

use crate::types::{Hostname, HostnameError};

/// Default system hostnames when none are configured.
pub const DEFAULT_SYSTEM_DOMAINS: &[&str] = &[
    "pagesnap.app",
    "www.pagesnap.app",
    "app.pagesnap.app",
    "localhost",
    "127.0.0.1",
];

/// Whether a host belongs to the platform or to a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    System,
    Custom,
}

/// Exact-match allow-list of system hostnames, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemDomains {
    hosts: Vec<Hostname>,
}

impl SystemDomains {
    /// Build from an iterator of hostnames.
    ///
    /// # Errors
    ///
    /// Returns the first entry that is not a valid hostname.
    pub fn new<I, S>(hosts: I) -> Result<Self, HostnameError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<Hostname> = Vec::new();
        for host in hosts {
            let host = Hostname::parse(host.as_ref())?;
            if !unique.contains(&host) {
                unique.push(host);
            }
        }
        Ok(Self { hosts: unique })
    }

    /// Parse a comma-separated list such as `pagesnap.app, localhost`.
    ///
    /// # Errors
    ///
    /// Returns an error if any non-blank entry is not a valid hostname.
    pub fn from_csv(list: &str) -> Result<Self, HostnameError> {
        Self::new(list.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    #[must_use]
    pub fn contains(&self, host: &Hostname) -> bool {
        self.hosts.contains(host)
    }

    #[must_use]
    pub fn kind_of(&self, host: &Hostname) -> HostKind {
        if self.contains(host) {
            HostKind::System
        } else {
            HostKind::Custom
        }
    }

    /// The first configured public hostname, used when a system-domain URL
    /// has to be built without a request host.
    #[must_use]
    pub fn primary(&self) -> Option<&Hostname> {
        self.hosts.iter().next()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hostname> {
        self.hosts.iter()
    }
}

impl Default for SystemDomains {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_DOMAINS).unwrap_or(Self { hosts: Vec::new() })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn host(s: &str) -> Hostname {
        Hostname::parse(s).unwrap()
    }

    #[test]
    fn test_exact_match_only() {
        let domains = SystemDomains::default();
        assert_eq!(domains.kind_of(&host("pagesnap.app")), HostKind::System);
        assert_eq!(domains.kind_of(&host("notpagesnap.app")), HostKind::Custom);
        assert_eq!(
            domains.kind_of(&host("pagesnap.app.evil.com")),
            HostKind::Custom
        );
        assert_eq!(domains.kind_of(&host("shop.pagesnap.app")), HostKind::Custom);
    }

    #[test]
    fn test_matching_uses_normalised_host() {
        let domains = SystemDomains::default();
        assert_eq!(domains.kind_of(&host("PageSnap.App:443")), HostKind::System);
        assert_eq!(domains.kind_of(&host("localhost:3000")), HostKind::System);
    }

    #[test]
    fn test_from_csv_skips_blanks() {
        let domains = SystemDomains::from_csv(" a.test , ,b.test,").unwrap();
        assert_eq!(domains.iter().count(), 2);
        assert!(domains.contains(&host("b.test")));
    }

    #[test]
    fn test_primary_is_first_configured() {
        let domains = SystemDomains::default();
        assert_eq!(domains.primary().unwrap().as_str(), "pagesnap.app");
        let dup = SystemDomains::from_csv("x.test,X.test").unwrap();
        assert_eq!(dup.iter().count(), 1);
    }

    #[test]
    fn test_from_csv_rejects_invalid() {
        assert!(SystemDomains::from_csv("ok.test, bad host").is_err());
    }
}

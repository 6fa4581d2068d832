//! Normalised hostname type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Hostname`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HostnameError {
    /// The input string is empty (after stripping the port).
    #[error("hostname cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("hostname must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character that can never appear in a hostname.
    #[error("hostname contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// A normalised hostname.
///
/// Every tier must derive the same key from the same `Host` header, so
/// normalisation happens exactly once, here:
///
/// - Surrounding whitespace is trimmed
/// - ASCII letters are lower-cased
/// - A `:port` suffix is removed (bracketed IPv6 literals keep their brackets)
/// - A trailing root dot (`example.com.`) is removed
///
/// ## Examples
///
/// ```
/// use pagesnap_core::Hostname;
///
/// let host = Hostname::parse("Shop.Example.COM:443").unwrap();
/// assert_eq!(host.as_str(), "shop.example.com");
///
/// assert!(Hostname::parse("").is_err());
/// assert!(Hostname::parse("bad host").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Hostname(String);

impl Hostname {
    /// Maximum length of a DNS name.
    pub const MAX_LENGTH: usize = 253;

    /// Parse and normalise a hostname (optionally carrying a port).
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or contains
    /// whitespace, a path separator, or other characters that cannot
    /// appear in a host.
    pub fn parse(s: &str) -> Result<Self, HostnameError> {
        let trimmed = s.trim();

        let without_port = if let Some(rest) = trimmed.strip_prefix('[') {
            // [v6]:port
            match rest.find(']') {
                Some(end) => &trimmed[..end + 2],
                None => return Err(HostnameError::InvalidCharacter('[')),
            }
        } else {
            trimmed.split_once(':').map_or(trimmed, |(host, _)| host)
        };

        let host = without_port.strip_suffix('.').unwrap_or(without_port);

        if host.is_empty() {
            return Err(HostnameError::Empty);
        }

        if host.len() > Self::MAX_LENGTH {
            return Err(HostnameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(bad) = host
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '[' | ']' | ':')))
        {
            return Err(HostnameError::InvalidCharacter(bad));
        }

        Ok(Self(host.to_ascii_lowercase()))
    }

    /// Returns the hostname as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The same host with a leading `www.` added or removed.
    ///
    /// Used as the secondary lookup key for custom domains, since tenants
    /// commonly register one form and receive traffic on both.
    #[must_use]
    pub fn www_toggled(&self) -> Self {
        self.0.strip_prefix("www.").map_or_else(
            || Self(format!("www.{}", self.0)),
            |bare| Self(bare.to_owned()),
        )
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Hostname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Hostname {
    type Error = HostnameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Hostname> for String {
    fn from(host: Hostname) -> Self {
        host.0
    }
}

impl core::str::FromStr for Hostname {
    type Err = HostnameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

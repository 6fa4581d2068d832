//! Failure taxonomy shared by every tier.
//!
//! Each tier has its own error enums; all of them map onto one
//! [`ErrorKind`] so that logs, diagnostic headers and conformance tests
//! speak the same vocabulary.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Category of a routing or rendering failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The path matches no known scheme (or the host is not a usable domain).
    UnknownRoute,
    /// A verified custom domain with no domain connection.
    ContentNotConnected,
    /// A recognised scheme whose content does not exist or is unpublished.
    ContentNotFound,
    /// Producing HTML for existing content failed.
    GenerationFailure,
    /// Embedded hydration data references content that no longer exists.
    StaleHydration,
    /// A backing store could not be reached.
    Unavailable,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownRoute => "unknown_route",
            Self::ContentNotConnected => "content_not_connected",
            Self::ContentNotFound => "content_not_found",
            Self::GenerationFailure => "generation_failure",
            Self::StaleHydration => "stale_hydration",
            Self::Unavailable => "unavailable",
        }
    }

    /// Whether a human should see the not-found page for this kind.
    #[must_use]
    pub const fn is_not_found(self) -> bool {
        matches!(
            self,
            Self::UnknownRoute | Self::ContentNotFound | Self::StaleHydration
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

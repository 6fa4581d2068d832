//! Hydration descriptor passed from the Snapshot Service to the Origin.
//!
//! When the Snapshot Service fails open after resolving a request, it
//! forwards the resolved [`ContentRef`] in [`HYDRATION_HEADER`] so the Origin
//! can render without resolving again. The Origin still checks that the
//! content exists; a descriptor naming deleted content is stale.
//!
//! The descriptor is carried per request in a [`HydrationSlot`] and consumed
//! exactly once.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thiserror::Error;

use crate::types::ContentRef;

/// Request header carrying the encoded descriptor.
pub const HYDRATION_HEADER: &str = "x-pagesnap-hydration";

#[derive(Debug, Error)]
pub enum HydrationError {
    #[error("hydration header is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("hydration payload is not a content reference: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Encode a reference for [`HYDRATION_HEADER`].
///
/// # Errors
///
/// Fails only if the reference cannot be serialized.
pub fn encode(content: &ContentRef) -> Result<String, HydrationError> {
    Ok(URL_SAFE_NO_PAD.encode(content.to_canonical_json()?))
}

/// Decode a [`HYDRATION_HEADER`] value.
///
/// # Errors
///
/// Returns an error for malformed base64 or JSON.
pub fn decode(value: &str) -> Result<ContentRef, HydrationError> {
    let bytes = URL_SAFE_NO_PAD.decode(value.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Request-scoped holder for a descriptor.
#[derive(Debug, Clone, Default)]
pub struct HydrationSlot(Option<ContentRef>);

impl HydrationSlot {
    #[must_use]
    pub const fn new(content: Option<ContentRef>) -> Self {
        Self(content)
    }

    /// Read a slot from an optional header value. Malformed values yield an
    /// empty slot.
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        Self(value.and_then(|v| decode(v).ok()))
    }

    /// Take the descriptor; later calls return `None`.
    pub const fn take(&mut self) -> Option<ContentRef> {
        self.0.take()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

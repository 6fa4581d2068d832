//! Core types for pagesnap.
//!
//! This module provides type-safe wrappers for the tenant/content model.

pub mod content;
pub mod hostname;
pub mod id;
pub mod model;
pub mod snapshot;

pub use content::{ContentRef, ContentType, RootKind, normalize_path, path_segments};
pub use hostname::{Hostname, HostnameError};
pub use id::*;
pub use model::{
    ContentLeaf, ContentRoot, CustomDomain, DomainConnection, LeafSummary, RootSettings, Seo,
    Store,
};
pub use snapshot::{Snapshot, SnapshotKey};
